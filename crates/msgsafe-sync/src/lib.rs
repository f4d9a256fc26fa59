//! msgsafe-sync: the backup state machine.
//!
//! [`SafeManager`] owns the trigger/debounce/single-flight scheduling and
//! the backup body itself; [`RestoreOrchestrator`] rebuilds a client from a
//! downloaded backup. Everything the subsystem needs from the surrounding
//! application (directory, identity, entities, groups, notifications) comes
//! in through the collaborator traits, so the whole flow is testable
//! against in-memory doubles and a loopback HTTP server.

pub mod blocking;
pub mod bus;
pub mod collaborators;
pub mod password;
pub mod payload;
pub mod restore;
pub mod scheduler;
pub mod testing;

pub use bus::{BackupTrigger, EventBus, SafeEvent};
pub use collaborators::{
    Collaborators, ContactRecord, DirectoryContact, DirectoryService, EntityStore, GroupManager,
    GroupRecord, IdentityProfile, IdentityStore, LinkPolicy, NotificationScheduler,
};
pub use restore::{RestoreOrchestrator, RestoreRequest};
pub use scheduler::{CustomServer, SafeManager};
