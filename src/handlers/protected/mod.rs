// handlers/protected/mod.rs - endpoints behind `require_authenticated`
//
// Triage endpoints in `posts` additionally require a collaborator; the
// router applies that guard to their routes only.

pub mod notifications;
pub mod posts;
pub mod tags;
pub mod user;
