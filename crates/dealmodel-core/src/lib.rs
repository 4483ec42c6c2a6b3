pub mod address;
pub mod assumptions;
pub mod cashflow;
pub mod completion;
pub mod config;
pub mod debt;
pub mod discovery;
pub mod error;
pub mod model;
pub mod period;
pub mod pipeline;
pub mod projection;
pub mod registry;
pub mod returns;
pub mod time_value;
pub mod types;
pub mod workbook;

pub use config::EngineConfig;
pub use error::ModelGenError;
pub use model::ModelInput;
pub use pipeline::{generate, GenerationSummary};
pub use types::*;
pub use workbook::{MemoryWorkbook, SheetHost};

/// Standard result type for all model-generation operations
pub type ModelGenResult<T> = Result<T, ModelGenError>;
