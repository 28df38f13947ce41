//! Collection, field, and route names shared by the store and controller.

/// Collection holding one document per task.
pub const TODOS_COLLECTION: &str = "todos";

/// Document field holding the owning user's ID.
///
/// Every query filters on this field and every create writes it.
pub const OWNER_FIELD: &str = "owner";

/// Document field holding the task's display text.
pub const CONTENT_FIELD: &str = "content";

/// Document field holding the completion flag.
pub const COMPLETED_FIELD: &str = "completed";

/// Default route the redirect policy sends anonymous users to.
pub const DEFAULT_SIGN_IN_ROUTE: &str = "/login";
