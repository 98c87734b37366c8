//! DNS lookups backing the email deliverability check (MX, then A records).

use crate::config::Config;
use crate::error::{AppError, Result};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{
    LookupIpStrategy, NameServerConfig, Protocol, ResolverConfig, ResolverOpts,
};

/// Represents the result of a mail server lookup.
#[derive(Debug, Clone)]
pub(crate) struct MailServer {
    /// The domain name or IP address of the mail server.
    pub exchange: String,
    /// The preference value (lower is more preferred), typically from MX records.
    /// Will be `u16::MAX` if derived from an A record.
    pub preference: u16,
}

impl MailServer {
    /// True when the server came from an MX record rather than the A record fallback.
    pub(crate) fn is_mx(&self) -> bool {
        self.preference != u16::MAX
    }
}

/// Creates a configured DNS resolver instance.
pub(crate) fn create_resolver(config: &Config) -> Result<TokioAsyncResolver> {
    let mut resolver_config = ResolverConfig::new();

    for server_str in &config.dns_servers {
        match IpAddr::from_str(server_str) {
            Ok(ip_addr) => {
                let socket_addr = SocketAddr::new(ip_addr, 53);
                resolver_config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Udp));
                resolver_config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Tcp));
            }
            Err(e) => {
                tracing::error!(
                    "Invalid DNS server IP address in config: '{}' - {}",
                    server_str,
                    e
                );
                return Err(AppError::Config(format!(
                    "Invalid DNS server IP address: {}",
                    server_str
                )));
            }
        }
    }

    let mut resolver_opts = ResolverOpts::default();
    resolver_opts.timeout = config.dns_timeout;
    resolver_opts.attempts = 2;
    resolver_opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

    let resolver = TokioAsyncResolver::tokio(resolver_config, resolver_opts);
    tracing::debug!("DNS resolver configured with {} servers.", config.dns_servers.len());
    Ok(resolver)
}

/// Resolves the mail server for a given domain, checking MX records first,
/// then falling back to A records.
///
/// # Arguments
/// * `resolver` - A configured `TokioAsyncResolver` instance.
/// * `domain` - The domain name to resolve.
///
/// # Returns
/// * `Ok(MailServer)` containing the most preferred mail server found.
/// * `Err(AppError)` if resolution fails (e.g., NXDOMAIN, NoAnswer, Timeout).
pub(crate) async fn resolve_mail_server(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<MailServer> {
    tracing::debug!("Performing DNS MX lookup for {}", domain);

    match resolver.mx_lookup(domain).await {
        Ok(mx_response) => {
            let mut mx_records: Vec<_> = mx_response.iter().collect();
            mx_records.sort_by_key(|r| r.preference());

            let Some(best_mx) = mx_records.first() else {
                tracing::warn!(
                    "MX lookup for {} succeeded but yielded no records.",
                    domain
                );
                return resolve_a_record_fallback(resolver, domain).await;
            };

            let exchange = best_mx
                .exchange()
                .to_utf8()
                .trim_end_matches('.')
                .to_string();
            if exchange.is_empty() {
                // Null MX (RFC 7505): the domain explicitly accepts no mail.
                tracing::debug!("Null MX record published for {}", domain);
                return Err(AppError::NoDnsRecords(format!(
                    "Empty exchange in MX record for {}",
                    domain
                )));
            }
            tracing::debug!(
                "Found MX for {}: {} (Pref: {})",
                domain,
                exchange,
                best_mx.preference()
            );
            Ok(MailServer {
                exchange,
                preference: best_mx.preference(),
            })
        }
        Err(e) => {
            let error_string = format!("{:?}", e.kind());

            if error_string.contains("NoRecordsFound") {
                tracing::debug!(
                    "No MX records found (NoAnswer) for {}. Trying A record fallback...",
                    domain
                );
                resolve_a_record_fallback(resolver, domain).await
            } else if error_string.contains("NXDomain")
                || error_string.contains("Name does not exist")
            {
                tracing::debug!("Domain {} does not exist (NXDOMAIN)", domain);
                Err(AppError::NxDomain(domain.to_string()))
            } else if error_string.contains("Timeout") {
                tracing::warn!("DNS resolution timeout for {}", domain);
                Err(AppError::DnsTimeout(domain.to_string()))
            } else {
                tracing::warn!("Unexpected DNS resolution error for {}: {}", domain, e);
                Err(AppError::Dns(e))
            }
        }
    }
}

/// Attempts to resolve an A record for the domain as a fallback mail server.
async fn resolve_a_record_fallback(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<MailServer> {
    tracing::debug!("Attempting A record fallback for {}", domain);
    match resolver.lookup_ip(domain).await {
        Ok(a_response) => match a_response.iter().next() {
            Some(ip_addr) => Ok(MailServer {
                exchange: ip_addr.to_string(),
                preference: u16::MAX,
            }),
            None => Err(AppError::NoDnsRecords(domain.to_string())),
        },
        Err(e) => {
            let error_string = format!("{:?}", e.kind());

            if error_string.contains("NoRecordsFound") {
                Err(AppError::NoDnsRecords(domain.to_string()))
            } else if error_string.contains("NXDomain")
                || error_string.contains("Name does not exist")
            {
                Err(AppError::NxDomain(domain.to_string()))
            } else if error_string.contains("Timeout") {
                Err(AppError::DnsTimeout(format!(
                    "A record fallback for {}",
                    domain
                )))
            } else {
                tracing::warn!("A record fallback failed for {}: {}", domain, e);
                Err(AppError::Dns(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_resolver_rejects_invalid_server() {
        let config = Config {
            dns_servers: vec!["not-an-ip".to_string()],
            ..Config::default()
        };
        assert!(matches!(create_resolver(&config), Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn test_create_resolver_accepts_defaults() {
        assert!(create_resolver(&Config::default()).is_ok());
    }

    #[test]
    fn test_mail_server_origin() {
        let mx = MailServer {
            exchange: "mx.example.com".to_string(),
            preference: 10,
        };
        let fallback = MailServer {
            exchange: "93.184.216.34".to_string(),
            preference: u16::MAX,
        };
        assert!(mx.is_mx());
        assert!(!fallback.is_mx());
    }
}
