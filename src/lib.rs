pub mod alignment;
pub mod analyzer;
pub mod auth;
pub mod config;
pub mod domain_utils;
pub mod error;
pub mod header;
pub mod identity;
pub mod verdict;

pub use alignment::AlignmentFlags;
pub use analyzer::{Analysis, AnalysisReport, MessageAnalyzer, PLACEHOLDER};
pub use auth::{DkimResult, DmarcResult, SpfResult};
pub use config::Config;
pub use error::CollaboratorError;
pub use identity::Identities;
pub use verdict::{Classification, Verdict};
