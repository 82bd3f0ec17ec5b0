mod record;

pub use record::{DailyRecord, NewDailyRecord, DEFAULT_MEDIA_TYPE};
