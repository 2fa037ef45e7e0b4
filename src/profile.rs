use crate::{
    config::{HeaderOption, ServerConfig},
    error::Result,
};
use std::net::SocketAddr;
use tracing::{info, warn};

pub const PROFILE_NAMES: [&str; 4] = ["wallet-test", "csp", "frontend", "test-suite"];

const ROOT: &str = "frontend";

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; \
     style-src 'self' 'unsafe-inline' https:; font-src 'self' https: data:";

pub struct Link {
    pub label: &'static str,
    pub path: &'static str,
}

/// A compiled-in server setup plus the launcher extras around it.
pub struct Profile {
    pub name: &'static str,
    pub config: ServerConfig,
    pub links: Vec<Link>,
    pub open_on_start: Option<&'static str>,
}

impl Profile {
    pub fn named(name: &str) -> Result<Option<Self>> {
        let profile = match name {
            "wallet-test" => Self::wallet_test()?,
            "csp" => Self::csp()?,
            "frontend" => Self::frontend()?,
            "test-suite" => Self::test_suite()?,
            _ => return Ok(None),
        };

        Ok(Some(profile))
    }

    /// Wallet extension testing: permissive CORS and no caching.
    pub fn wallet_test() -> Result<Self> {
        Ok(Self {
            name: "wallet-test",
            config: ServerConfig::new(ROOT)
                .port(8000)
                .with(HeaderOption::Cors)?
                .with(HeaderOption::NoCache)?,
            links: vec![
                Link {
                    label: "Main Test",
                    path: "index-test.html",
                },
                Link {
                    label: "Extension Detector",
                    path: "extension-detector.html",
                },
                Link {
                    label: "Full Game",
                    path: "index.html",
                },
                Link {
                    label: "Wallet Test",
                    path: "wallet-connection-test.html",
                },
            ],
            open_on_start: None,
        })
    }

    pub fn csp() -> Result<Self> {
        Ok(Self {
            name: "csp",
            config: ServerConfig::new(ROOT)
                .port(3000)
                .with(HeaderOption::Csp(CONTENT_SECURITY_POLICY.into()))?,
            links: vec![Link {
                label: "Main App",
                path: "index.html",
            }],
            open_on_start: None,
        })
    }

    /// Plain frontend server: no extra headers, falls back to 8081 when busy.
    pub fn frontend() -> Result<Self> {
        Ok(Self {
            name: "frontend",
            config: ServerConfig::new(ROOT).port(8080).fallback_port(8081),
            links: vec![
                Link {
                    label: "Test Page",
                    path: "simple-wallet-test.html",
                },
                Link {
                    label: "Main Game",
                    path: "index.html",
                },
            ],
            open_on_start: Some("simple-wallet-test.html"),
        })
    }

    /// Advanced wallet test suite: cache disabled, opens the site root.
    pub fn test_suite() -> Result<Self> {
        Ok(Self {
            name: "test-suite",
            config: ServerConfig::new(ROOT)
                .port(8080)
                .with_header("Cache-Control", "no-store, no-cache, must-revalidate")?,
            links: vec![
                Link {
                    label: "Main App",
                    path: "index.html",
                },
                Link {
                    label: "Test Suite",
                    path: "test-advanced-wallet.html",
                },
            ],
            open_on_start: Some(""),
        })
    }

    pub fn banner(&self, addr: SocketAddr) -> String {
        let base = base_url(addr);
        let mut banner = format!(
            "🚀 Static File Server ({})\n{}\n📂 Serving directory: {}\n🌐 Local server: {base}\n{}\n",
            self.name,
            "=".repeat(50),
            self.config.root.display(),
            "=".repeat(50),
        );

        if !self.links.is_empty() {
            banner += "\n📋 Quick links:\n";

            for link in &self.links {
                banner += &format!("   • {}: {base}/{}\n", link.label, link.path);
            }
        }

        banner += "\nPress Ctrl+C to stop the server";
        banner
    }

    /// Page to open once bound; an empty path opens the site root.
    pub fn browser_url(&self, addr: SocketAddr) -> Option<String> {
        self.open_on_start
            .map(|path| format!("{}/{path}", base_url(addr)))
    }

    /// Prints the banner and opens the browser if the profile asks for it.
    pub fn announce(&self, addr: SocketAddr) {
        println!("{}", self.banner(addr));

        if let Some(url) = self.browser_url(addr) {
            open_browser(&url);
        }
    }
}

pub fn base_url(addr: SocketAddr) -> String {
    format!("http://localhost:{}", addr.port())
}

pub fn open_browser(url: &str) {
    match open::that(url) {
        Ok(()) => info!(url, "opened browser"),
        Err(error) => warn!(%error, url, "could not open browser"),
    }
}
