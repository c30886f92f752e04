// 外部系統的具體實作：本地檔案、關聯式資料庫、輸出檔
pub mod output_sink;
pub mod sql_sink;
pub mod storage;
