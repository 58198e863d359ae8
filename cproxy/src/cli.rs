use std::path::PathBuf;

use clap::Parser;

/// Command line arguments for the caching proxy
#[derive(Parser, Debug, Clone)]
#[command(name = "cproxy")]
#[command(about = "Forward caching proxy: caches origin responses in memory per HTTP caching rules")]
#[command(version)]
pub struct Cli {
    /// Port to listen on (or, with --clear-cache, of the running instance)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Origin base URL, e.g. http://dummyjson.com
    #[arg(short, long, requires = "port", conflicts_with = "clear_cache")]
    pub origin: Option<String>,

    /// Clear the cache of a running instance instead of starting one
    #[arg(short, long)]
    pub clear_cache: bool,

    /// Configuration file (defaults to ./cproxy.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Serve,
    ClearCache,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.clear_cache {
            Mode::ClearCache
        } else {
            Mode::Serve
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Mode};
    use clap::Parser;

    #[test]
    fn port_and_origin_start_the_proxy() {
        let cli = Cli::try_parse_from(["cproxy", "--port", "3000", "--origin", "http://dummyjson.com"])
            .expect("valid flags");
        assert_eq!(cli.port, Some(3000));
        assert_eq!(cli.origin.as_deref(), Some("http://dummyjson.com"));
        assert_eq!(cli.mode(), Mode::Serve);
    }

    #[test]
    fn clear_cache_conflicts_with_origin() {
        assert!(Cli::try_parse_from(["cproxy", "-c", "-p", "3000", "-o", "http://x.com"]).is_err());
        let cli = Cli::try_parse_from(["cproxy", "-c", "-p", "3000"]).expect("valid flags");
        assert_eq!(cli.mode(), Mode::ClearCache);
    }

    #[test]
    fn origin_requires_port_and_port_must_be_nonzero() {
        assert!(Cli::try_parse_from(["cproxy", "--origin", "http://x.com"]).is_err());
        assert!(Cli::try_parse_from(["cproxy", "--port", "0", "--origin", "http://x.com"]).is_err());
        assert!(Cli::try_parse_from(["cproxy", "--port", "70000", "--origin", "http://x.com"]).is_err());
    }
}
