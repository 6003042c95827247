mod legacy;

pub use legacy::{import_channels, import_history, ImportSummary};
