// src/components/mod.rs

// テーブルに出てくるデータの形を定義するサブモジュールたち！
pub mod dragging_info; // ドラッグ中・着地待ちの記録 🖱️
pub mod position; // 位置と描画情報 📍
pub mod region; // レイアウト定義の領域 🗺️
pub mod stack; // カード・スタック・グループの ID と TableState 🃏
