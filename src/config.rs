use std::net::IpAddr;
use std::time::Duration;

use crate::api::{Credentials, DEFAULT_PAGE_SIZE};
use crate::error::{Error, Result};
use crate::submission::{
    AttachmentVersion, BinaryNaming, DownloadOptions, FailurePolicy, FormatOptions, KeyMask,
    SelectMask,
};

pub const DEFAULT_API_ROOT: &str = "https://kf.kobotoolbox.org/";

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub page_size: u32,
    pub timeout: Duration,
    pub max_body_size: usize,
    pub format: FormatOptions,
    pub download: DownloadOptions,
    pub relay_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let credentials = Credentials {
            url: env_or("KOBO_URL", DEFAULT_API_ROOT),
            token: env_required("KOBO_TOKEN")?,
        };

        let host: IpAddr = env_or("KOBOFLOW_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| Error::Config(format!("Invalid KOBOFLOW_HOST: {e}")))?;

        let port: u16 = env_or("KOBOFLOW_PORT", "3000")
            .parse()
            .map_err(|e| Error::Config(format!("Invalid KOBOFLOW_PORT: {e}")))?;

        let log_level = env_or("KOBOFLOW_LOG_LEVEL", "info");

        let page_size: u32 = env_or("KOBOFLOW_PAGE_SIZE", &DEFAULT_PAGE_SIZE.to_string())
            .parse()
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| Error::Config("KOBOFLOW_PAGE_SIZE must be a positive integer".to_string()))?;

        let timeout_secs: u64 = env_or("KOBOFLOW_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| Error::Config(format!("Invalid KOBOFLOW_TIMEOUT_SECS: {e}")))?;

        let max_body_size: usize = env_or("KOBOFLOW_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| Error::Config(format!("Invalid KOBOFLOW_MAX_BODY_SIZE: {e}")))?;

        let format = FormatOptions {
            reformat: env_flag("KOBOFLOW_REFORMAT")?,
            select_mask: SelectMask::parse(&env_or("KOBOFLOW_SELECT_MASK", "")),
            number_mask: KeyMask::parse(&env_or("KOBOFLOW_NUMBER_MASK", "")),
            multi_select_mask: KeyMask::parse(&env_or("KOBOFLOW_MULTI_SELECT_MASK", "")),
        };

        let download = DownloadOptions {
            download: env_flag("KOBOFLOW_DOWNLOAD")?,
            naming: env_or("KOBOFLOW_BINARY_NAMING", "question")
                .parse::<BinaryNaming>()
                .map_err(|e| Error::Config(format!("Invalid KOBOFLOW_BINARY_NAMING: {e}")))?,
            prefix: env_or("KOBOFLOW_ATTACHMENT_PREFIX", "attachment_"),
            version: env_or("KOBOFLOW_ATTACHMENT_VERSION", "download_url")
                .parse::<AttachmentVersion>()
                .map_err(|e| Error::Config(format!("Invalid KOBOFLOW_ATTACHMENT_VERSION: {e}")))?,
            policy: if env_flag("KOBOFLOW_FAIL_FAST")? {
                FailurePolicy::FailFast
            } else {
                FailurePolicy::BestEffort
            },
        };

        let relay_url = std::env::var("KOBOFLOW_RELAY_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Config {
            credentials,
            host,
            port,
            log_level,
            page_size,
            timeout: Duration::from_secs(timeout_secs),
            max_body_size,
            format,
            download,
            relay_url,
        })
    }
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| Error::Config(format!("Missing required environment variable: {key}")))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> Result<bool> {
    parse_flag(&env_or(key, "false")).ok_or_else(|| Error::Config(format!("Invalid {key}: expected true or false")))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
