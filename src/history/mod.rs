//! Operation history
//!
//! The action/operation data model and the pure algorithms over operation
//! lists: ordering, garbage collection, integrity checks and branch
//! reconciliation.

pub mod action;
mod merge;
mod operation;
mod ordering;
mod scope;
mod validation;

pub use action::{
    attachment_ref, create_action, is_control_type, Action, ActionContext, Attachment,
    AttachmentInput, LoadStateInput, LoadStatePayload, PruneInput,
};
pub use merge::{
    attach_branch, filter_duplicated_operations, merge, operations_are_equal, precedes,
    reshuffle_by_timestamp, reshuffle_by_timestamp_and_index, split, Reshuffle, Split,
};
pub use operation::{OpIndex, Operation, OperationIndex};
pub use ordering::{
    check_cleaned_operations_integrity, check_operations_integrity, diff_operations,
    filter_document_operations_resulting_state, garbage_collect,
    garbage_collect_document_operations, group_operations_by_scope, next_skip_number,
    prepare_operations, remove_existing_operations, skip_header_operations, sort_operations,
    IntegrityCategory, IntegrityIssue, PreparedOperations,
};
pub use scope::{PerScope, Scope};
pub use validation::{FieldKind, FieldSpec, InputSchema, InputValidator, ValidationIssue};
