use crate::db::models::SessionRecord;
use crate::db::Database;
use crate::error::Result;

/// Decides whether a caller may run the pipeline against a session.
/// A seam so tests can substitute fixed policies.
pub trait AccessPolicy: Send + Sync {
    fn has_access(&self, db: &Database, session: &SessionRecord, actor: &str) -> Result<bool>;
}

/// Default policy: the designated speaker may always process their own
/// session; otherwise the caller needs an admin or organizer role in the
/// session's organization. Plain members and outsiders are refused.
pub struct OrgRoleAccess;

impl AccessPolicy for OrgRoleAccess {
    fn has_access(&self, db: &Database, session: &SessionRecord, actor: &str) -> Result<bool> {
        if actor == session.speaker {
            return Ok(true);
        }
        match db.role_of(&session.organization, actor)? {
            Some(role) => Ok(role == "admin" || role == "organizer"),
            None => Ok(false),
        }
    }
}
