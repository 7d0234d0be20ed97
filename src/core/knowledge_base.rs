// src/core/knowledge_base.rs

//! Static, read-only reference data used across the scanner.
//! Keeping these tables in one place makes the heuristics easy to review and tune.

use std::time::Duration;

/// Web ports probed when a target does not name one.
pub const DEFAULT_PORTS: &str = "80,81,88,99,443,800,801,808,888,1000,1010,1080,1099,2375,2379,3000,3128,5000,5003,5555,6080,7001,7002,7070,7071,7080,7200,7777,7890,8000,8001,8008,8010,8011,8020,8028,8030,8042,8053,8069,8070,8080,8081,8083,8088,8090,8091,8096,8100,8118,8161,8180,8181,8200,8222,8244,8280,8360,8443,8484,8800,8848,8868,8880,8888,8899,8983,8989,9000,9001,9002,9008,9010,9043,9060,9080,9081,9088,9090,9091,9100,9200,9443,9800,9981,9988,9999,10000,10001,10250,12443,18000,18080,18088,19001,20000,20880";

/// Public recursive resolvers queried before falling back to the platform resolver.
pub const DEFAULT_DNS_SERVERS: &[&str] = &[
    "8.8.8.8",         // Google
    "9.9.9.9",         // Quad9
    "114.114.114.114", // 114DNS
    "223.5.5.5",       // AliDNS
    "180.76.76.76",    // Baidu
    "1.1.1.1",         // Cloudflare
];

/// Conventional favicon locations, checked in order with a HEAD request.
pub const FAVICON_PATHS: &[&str] = &[
    "/favicon.ico",
    "/favicon.png",
    "/favicon.jpg",
    "/assets/favicon.ico",
    "/static/favicon.ico",
    "/img/favicon.ico",
    "/images/favicon.ico",
];

/// Shortest CIDR prefixes accepted as targets; wider blocks are rejected.
pub const MIN_IPV4_PREFIX: u8 = 16;
pub const MIN_IPV6_PREFIX: u8 = 112;

/// Most addresses a dash range may expand to.
pub const MAX_RANGE_ADDRESSES: u32 = 1 << (32 - MIN_IPV4_PREFIX);

/// Ceiling on a single favicon HEAD check, below the main request timeout.
pub const MAX_HEAD_TIMEOUT: Duration = Duration::from_secs(2);

/// Last-resort favicon location, used without an existence check.
pub const FALLBACK_FAVICON: &str = "/favicon.ico";

/// Titles longer than this many characters are truncated.
pub const TITLE_MAX_LEN: usize = 40;

/// Appended to truncated titles.
pub const TITLE_ELLIPSIS: &str = "...";

/// Returned when no title can be derived from a response.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Client-redirect script patterns only look at this many leading body bytes.
pub const SCRIPT_REDIRECT_WINDOW: usize = 700;

/// Multiplier applied to the task count when sizing the scan queue.
pub const QUEUE_SLACK: usize = 5;

/// Upper bound on the scan queue capacity.
pub const MAX_QUEUE_CAPACITY: usize = 65_536;

pub const DEFAULT_FINGER_FILE: &str = "resource/fingers.json";
pub const DEFAULT_CDN_CNAME_FILE: &str = "resource/cdn_cname.txt";
pub const DEFAULT_CDN_IP_FILE: &str = "resource/cdn_ip.txt";
pub const DEFAULT_OUTPUT_FILE: &str = "result.txt";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

pub const DEFAULT_DNS_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_DNS_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);
