pub mod authorization;
pub mod response;
pub mod session;
pub mod setup;
pub mod tenant;

pub use authorization::{
    check_private_tenant, check_token_origin, require_administrator, require_authenticated, require_collaborator,
};
pub use response::{ApiResponse, ApiResult};
pub use session::{read_session, set_jwt_from_query};
pub use setup::web_setup;
pub use tenant::{optional_tenant, require_tenant};
