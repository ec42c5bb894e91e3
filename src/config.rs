use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// One-time code policy: length, lifetime and alphabet composition.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub length: usize,
    pub ttl_minutes: i64,
    pub digits: bool,
    pub letters: bool,
    pub symbols: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub s3_endpoint: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_region: String,
    pub ses_region: String,
    pub mail_from: String,
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "rideauth".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "rideauth-users".into()),
            ttl_minutes: env_i64("JWT_TTL_MINUTES", 15),
            refresh_ttl_minutes: env_i64("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let otp = OtpConfig {
            length: env_i64("OTP_LENGTH", 6) as usize,
            ttl_minutes: env_i64("OTP_TTL_MINUTES", 10),
            digits: env_bool("OTP_DIGITS", true),
            letters: env_bool("OTP_LETTERS", false),
            symbols: env_bool("OTP_SYMBOLS", false),
        };
        Ok(Self {
            database_url,
            jwt,
            otp,
            s3_endpoint: std::env::var("S3_ENDPOINT")?,
            s3_bucket: std::env::var("S3_BUCKET")?,
            s3_access_key: std::env::var("S3_ACCESS_KEY")?,
            s3_secret_key: std::env::var("S3_SECRET_KEY")?,
            s3_region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            ses_region: std::env::var("SES_REGION").unwrap_or_else(|_| "us-east-1".into()),
            mail_from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@rideauth.app".into()),
        })
    }
}
