pub mod card_service;
pub mod serialized_sink;
pub mod workbook;

pub use crate::domain::model::{CardImages, ContactRecord, ExportFile, SheetRow};
pub use crate::domain::ports::{CardExtractor, ContactSink, Storage};
pub use crate::utils::error::Result;
