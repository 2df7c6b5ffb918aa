//! Core domain logic for the feedback processor.
//!
//! This crate contains the fundamental types and transformations:
//! - Event model: raw IDE interaction events and their payloads
//! - Filtering: the cleanup chain run before any analysis
//! - Intervals: the generic stream-to-interval state machine and its
//!   active-window specialization
//! - Developers: identity records, duplicate consolidation, statistics
//! - Completion traces: interaction traces of completion sessions

pub mod completion;
pub mod concurrency;
pub mod developer;
pub mod event;
pub mod filter;
pub mod interval;
pub mod window;

mod types;

pub use completion::{CompletionAction, CompletionTrace, TraceExtractor};
pub use developer::{
    ConsolidationStats, Developer, DeveloperStatistics, DeveloperStore, consolidate,
    find_session_developer, statistics,
};
pub use event::{Activity, Event, EventKind};
pub use filter::{FilterChain, FilterStats};
pub use interval::{Interval, IntervalPolicy, StreamState};
pub use types::{DeveloperId, SessionId, ValidationError};
pub use window::{OUTSIDE_IDE, WindowPolicy, WindowUsageReport};
