// src/components/stack.rs

// serde を使うためにインポート！ サーバーから届く状態は JSON なので Deserialize が必須だよ。
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// --- ID 型 ---
// サーバー側の ID はただの文字列。取り違えないように newtype で包んでおく。
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// カード1枚の ID。
    CardId
);
string_id!(
    /// スタック (同じ場所に積まれたカードの山) の ID。
    StackId
);
string_id!(
    /// グループ (手札や山札など、スタックの順序付きリスト) の ID。
    GroupId
);
string_id!(
    /// レイアウト上の領域 (Region) の ID。
    RegionId
);

/// free 領域の中でスタックが置かれている場所。領域に対するパーセント (0-100)。
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FreePosition {
    pub x: f32,
    pub z: f32,
}

/// 1つの論理的な位置に積まれたカードの山だよ。
/// `cards` の先頭が一番下のカード。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Stack {
    pub cards: Vec<CardId>,
    /// free 領域にあるときだけ意味を持つ、明示的な置き場所。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_position: Option<FreePosition>,
}

impl Stack {
    pub fn new(cards: impl IntoIterator<Item = CardId>) -> Self {
        Self { cards: cards.into_iter().collect(), free_position: None }
    }

    pub fn with_free_position(mut self, x: f32, z: f32) -> Self {
        self.free_position = Some(FreePosition { x, z });
        self
    }
}

/// 権威あるストア (サーバー) から届いたテーブル全体のスナップショット。
/// このクレートからは読み取り専用！ 書き換えるのはサーバーだけ。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct TableState {
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub groups: HashMap<GroupId, Vec<StackId>>,
    #[serde(default)]
    pub stacks: HashMap<StackId, Stack>,
}

impl TableState {
    /// グループ内のスタックを順番通りに返す。知らないグループなら空。
    pub fn group_stacks(&self, group: &GroupId) -> &[StackId] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stack(&self, stack_id: &StackId) -> Option<&Stack> {
        self.stacks.get(stack_id)
    }

    /// スタックが今どのグループに属しているか。
    pub fn group_of(&self, stack_id: &StackId) -> Option<&GroupId> {
        self.groups
            .iter()
            .find(|(_, stacks)| stacks.contains(stack_id))
            .map(|(group, _)| group)
    }

    pub fn index_in_group(&self, group: &GroupId, stack_id: &StackId) -> Option<usize> {
        self.group_stacks(group).iter().position(|s| s == stack_id)
    }

    /// カードを含んでいるスタックを探す。
    pub fn stack_of_card(&self, card_id: &CardId) -> Option<&StackId> {
        self.stacks
            .iter()
            .find(|(_, stack)| stack.cards.contains(card_id))
            .map(|(id, _)| id)
    }
}
