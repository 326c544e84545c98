//! Route paths.

pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
pub const GET_USER: &str = "/api/user";
pub const POST_USERS: &str = "/api/users";
pub const PUT_USER_PASSWORD: &str = "/api/users/{login}/password";
