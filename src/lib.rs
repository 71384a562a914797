pub mod analyze;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod query;
pub mod record;
pub mod source;

pub use analyze::{analyze_file, analyze_many, AnalysisOptions};
pub use config::Config;
pub use error::{DecodeError, QueryError};
pub use graph::{Graph, GraphBuilder, Node};
pub use query::{ActivePath, Sidechain, Statistics, ToolUsage};
pub use record::{decode_line, Record, RecordKind};
