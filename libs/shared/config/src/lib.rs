use std::env;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotGenerationMode {
    /// Expand recurring schedules in-process and bulk insert the result.
    App,
    /// Delegate to the `generate_slots_from_schedules` store procedure.
    Store,
}

impl SlotGenerationMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "app" => Some(SlotGenerationMode::App),
            "store" | "rpc" => Some(SlotGenerationMode::Store),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub supabase_service_role_key: String,
    pub public_base_url: String,
    pub port: u16,
    pub slot_generation_mode: SlotGenerationMode,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, public booking and sign-up rollback will use the anon key");
                    String::new()
                }),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| {
                    warn!("PUBLIC_BASE_URL not set, using default");
                    "http://localhost:3000".to_string()
                }),
            port: env::var("PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(3000),
            slot_generation_mode: env::var("SLOT_GENERATION_MODE")
                .ok()
                .map(|mode| {
                    SlotGenerationMode::parse(&mode).unwrap_or_else(|| {
                        warn!("Unknown SLOT_GENERATION_MODE '{}', falling back to app", mode);
                        SlotGenerationMode::App
                    })
                })
                .unwrap_or(SlotGenerationMode::App),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn has_service_role(&self) -> bool {
        !self.supabase_service_role_key.is_empty()
    }
}
