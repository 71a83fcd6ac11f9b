pub mod bugzilla;
pub mod classification;
pub mod collect;
pub mod commit;
pub mod date_bounds;
pub mod defaults;
pub mod extractor;
pub mod identify;
pub mod issue_id;
pub mod matching;
pub mod profile;
pub mod progress;
pub mod registry;
pub mod report;
pub mod scanner;
pub mod tracker;
pub mod workdir;
