// handlers/public/mod.rs - endpoints open to anonymous callers
//
// Tenant privacy still applies: post reads sit behind `check_private_tenant`
// and sign-in flows refuse unknown identities on private tenants.

pub mod health;
pub mod images;
pub mod oauth;
pub mod posts;
pub mod signin;
pub mod signup;
pub mod sitemap;
pub mod tags;
