mod channel;
mod growth;
mod history;
mod keyword;
mod report;

pub use channel::{channel_url, ArchivedChannel, Channel, NewChannel};
pub use growth::GrowthResult;
pub use history::{format_timestamp, parse_timestamp, HistoryRecord};
pub use keyword::KeywordScore;
pub use report::{ReportPeriod, ReportRow, Tier};
