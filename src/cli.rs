// src/cli.rs

use crate::core::config::ScanConfig;
use crate::core::knowledge_base::{
    DEFAULT_CDN_CNAME_FILE, DEFAULT_CDN_IP_FILE, DEFAULT_FINGER_FILE, DEFAULT_OUTPUT_FILE, DEFAULT_PORTS,
};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "dfinger")]
#[command(version)]
#[command(about = "Web fingerprinting: liveness, DNS/CDN triage, page analysis and rule-based technology detection", long_about = None)]
#[command(group(ArgGroup::new("targets").required(true).args(["addr", "file"])))]
pub struct Cli {
    #[arg(short = 'a', long, help = "Targets: IP, CIDR, IP range (1.1.1.1-20), domain or URL. Comma separated.")]
    pub addr: Option<String>,

    #[arg(short = 'f', long, help = "File with one target per line")]
    pub file: Option<PathBuf>,

    #[arg(short = 'p', long, help = "Ports, e.g. 80,443,8000-8100 (default: built-in web port list)")]
    pub ports: Option<String>,

    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_FILE, help = "Append results to this file")]
    pub output: PathBuf,

    #[arg(long, help = "Do not write a result file")]
    pub no_output: bool,

    #[arg(short = 't', long, default_value_t = 500, help = "Concurrent workers")]
    pub threads: usize,

    #[arg(short = 'T', long, default_value_t = 5, help = "Per-request timeout in seconds")]
    pub timeout: u64,

    #[arg(long, default_value = DEFAULT_FINGER_FILE, help = "Fingerprint rule file (JSON)")]
    pub finger: PathBuf,

    #[arg(long, default_value = DEFAULT_CDN_CNAME_FILE, help = "CDN CNAME keyword list")]
    pub cdn_cname: PathBuf,

    #[arg(long, default_value = DEFAULT_CDN_IP_FILE, help = "CDN CIDR list")]
    pub cdn_ip: PathBuf,

    #[arg(long = "dns-server", help = "DNS server (ip or ip:port). Repeatable; replaces the built-in list.")]
    pub dns_servers: Vec<String>,

    #[arg(long, help = "Write JSON lines instead of plain text to the result file")]
    pub json: bool,

    #[arg(long, help = "Do not follow HTTP 3xx redirects")]
    pub no_follow: bool,

    #[arg(short, long, help = "Enable debug logging")]
    pub verbose: bool,
}

impl Cli {
    /// Port specification to expand targets with.
    pub fn port_spec(&self) -> &str {
        self.ports.as_deref().unwrap_or(DEFAULT_PORTS)
    }

    /// Maps flags onto a [`ScanConfig`]; anything without a flag keeps its default.
    pub fn to_config(&self) -> ScanConfig {
        let defaults = ScanConfig::default();
        ScanConfig {
            concurrency: self.threads,
            timeout: Duration::from_secs(self.timeout),
            dns_servers: if self.dns_servers.is_empty() { defaults.dns_servers.clone() } else { self.dns_servers.clone() },
            follow_http_redirects: !self.no_follow,
            output_file: (!self.no_output).then(|| self.output.clone()),
            json_output: self.json,
            finger_file: self.finger.clone(),
            cdn_cname_file: self.cdn_cname.clone(),
            cdn_ip_file: self.cdn_ip.clone(),
            ..defaults
        }
    }
}
