//! Journal entry lifecycle: owner-scoped storage and debounced editing.

pub mod autosave;
pub mod editor;
pub mod store;

pub use autosave::{AutosaveError, AutosaveHandle, AutosaveStatus, Persist, SaveState};
pub use editor::{DocumentPersister, EditorSessions};
pub use store::{
    EntryStore, GoalPatch, MAX_LIST_LIMIT, NewGoal, NewInterview, NewReview, ReviewPatch,
    SearchResults, clamp_limit, parse_entry_date,
};
