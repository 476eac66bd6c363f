// Fixed request catalogs.

pub const BROWSER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

pub const SUSPICIOUS_AGENTS: &[&str] = &[
    "curl/7.68.0",
    "wget/1.20.3",
    "python-requests/2.28.1",
    "bot/1.0",
    "crawler/2.0",
    "spider/1.5",
    "scraper",
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
];

pub const HEADLESS_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) HeadlessChrome/91.0.4472.0 Safari/537.36",
    "Mozilla/5.0 (Unknown; Linux x86_64) AppleWebKit/534.34 (KHTML, like Gecko) PhantomJS/1.9.8 Safari/534.34",
];

/// UA markers that must be blocked outright.
pub const HEADLESS_MARKERS: &[&str] = &["HeadlessChrome", "PhantomJS"];

pub const SQL_INJECTION_PAYLOADS: &[&str] = &[
    "1' OR '1'='1",
    "1; DROP TABLE users--",
    "' UNION SELECT * FROM users--",
    "1' AND 1=1--",
    "'; INSERT INTO users VALUES('test','test')--",
    "1' OR 1=1#",
    "admin'--",
    "' OR 'x'='x",
    "1' UNION ALL SELECT NULL,NULL,NULL--",
];

/// (label, query parameter, payload)
pub const QUERY_PROBES: &[(&str, &str, &str)] = &[
    ("XSS Probe", "search", "<script>alert('xss')</script>"),
    ("Path Traversal Probe", "file", "../../../etc/passwd"),
    ("Command Injection Probe", "cmd", "; ls -la"),
];

pub const SPOOFED_HEADERS: &[(&str, &str)] = &[
    ("X-Real-IP", "192.168.1.100"),
    ("X-Forwarded-For", "10.0.0.1, 192.168.1.1"),
    ("X-Forwarded-Host", "malicious.com"),
    ("X-Forwarded-Proto", "https"),
    ("Host", "spoofed-host.com"),
    ("Referer", "http://malicious-site.com"),
    ("Origin", "http://evil.com"),
    ("X-Custom-Header", "injection<script>alert('xss')</script>"),
];

pub const ADMIN_PATHS: &[&str] = &["/api/admin/bot-dashboard", "/api/admin/bot-metrics"];

pub const BURST_AGENT: &str = "RateLimitTester/1.0";
pub const BURST_EMAIL: &str = "test@rate.com";
pub const BURST_PASSWORD: &str = "test123";

pub const TEST_MARKER_HEADER: &str = "X-NextBuy-Test-Request";

/// Placeholder in a path mix for a product search with a random term.
pub const SEARCH_MARKER: &str = "?search";
pub const SEARCH_TERMS: &[&str] = &["laptop", "phone", "book", "shoes", "watch"];

// Weighted mixes: homepage 5, health 3, products 2, search 1.
pub const NORMAL_BROWSING_MIX: &[&str] = &[
    "/", "/health", "/api/products", "/", "/health", "/", SEARCH_MARKER, "/api/products", "/", "/health", "/",
];
pub const BOT_BEHAVIOR_MIX: &[&str] = &["/health", "/", "/health", "/", "/health"];
pub const MIXED_MIX: &[&str] = &["/", "/health", "/api/products"];
