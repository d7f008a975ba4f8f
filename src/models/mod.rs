pub mod blob;
pub mod notification;
pub mod oauth;
pub mod post;
pub mod tag;
pub mod tenant;
pub mod user;
pub mod verification;

pub use blob::{Blob, ImageUpload, ImageUploadInput, UploadedFile};
pub use notification::Notification;
pub use oauth::{is_custom_provider, mask_secret, OAuthConfig, OAuthConfigStatus, OAuthProviderOption, UserProfile};
pub use post::{Comment, Post, PostResponse, PostStatus};
pub use tag::Tag;
pub use tenant::{Tenant, TenantSettings, TenantStatus};
pub use user::{Role, User, UserProvider};
pub use verification::{EmailVerification, EmailVerificationKind, NewEmailVerification};
