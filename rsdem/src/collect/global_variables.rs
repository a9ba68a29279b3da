/// Root of the Earth Engine REST API.
pub const EE_API_ROOT: &str = "https://earthengine.googleapis.com/v1";

/// Environment variable holding the Google Cloud project id.
pub const EE_PROJECT_ENV: &str = "EE_PROJECT";

/// Environment variable holding an OAuth2 access token for the API.
pub const EE_ACCESS_TOKEN_ENV: &str = "EE_ACCESS_TOKEN";
