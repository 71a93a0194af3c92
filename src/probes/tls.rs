// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{verify_server_cert_signed_by_trust_anchor, verify_server_name};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{
    AlertDescription, CertificateError, ClientConfig, DigitallySignedStruct, PeerIncompatible,
    ProtocolVersion, RootCertStore, SignatureScheme,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};
use url::Url;

use crate::domain::models::probe::TlsResult;
use crate::probes::traits::{Probe, ProbeError, ProbeTarget};

const SECONDS_PER_DAY: i64 = 86_400;
/// 有效期搜索范围（天）
const EXPIRY_SEARCH_DAYS: i64 = 3_650;

/// 握手阶段接受任意证书，证书本身在握手完成后单独评估，
/// 这样无效证书也能得到完整的诊断结果。握手签名仍然校验。
#[derive(Debug)]
struct DeferredVerification {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for DeferredVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// TLS 证书探针
///
/// 直接建立 TCP 连接并完成握手，随后针对受信任根证书评估证书链、
/// 主机名匹配与剩余有效期。
pub struct TlsProbe {
    roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
    timeout: Duration,
}

impl TlsProbe {
    /// 使用系统根证书创建探针
    pub fn new(timeout: Duration) -> Self {
        let mut roots = RootCertStore::empty();
        let native = rustls_native_certs::load_native_certs();
        for err in &native.errors {
            warn!("Failed to load native certificate: {}", err);
        }
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        debug!("Loaded {} native root certificates ({} ignored)", added, ignored);
        Self::with_roots(roots, timeout)
    }

    /// 使用指定根证书创建探针
    pub fn with_roots(roots: RootCertStore, timeout: Duration) -> Self {
        Self {
            roots: Arc::new(roots),
            provider: Arc::new(rustls::crypto::ring::default_provider()),
            timeout,
        }
    }

    fn client_config(&self) -> Result<ClientConfig, ProbeError> {
        let verifier = Arc::new(DeferredVerification {
            provider: self.provider.clone(),
        });
        let config = ClientConfig::builder_with_provider(self.provider.clone())
            .with_safe_default_protocol_versions()
            .map_err(|e| ProbeError::Tls(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();
        Ok(config)
    }

    /// 完成握手，返回证书链与协商的协议版本
    ///
    /// 服务器拒绝 TLS 1.2/1.3 时返回 `Ok(None)`
    async fn handshake(&self, host: &str, port: u16) -> Result<Option<Handshake>, ProbeError> {
        let server_name =
            ServerName::try_from(host.to_string()).map_err(|e| ProbeError::Tls(e.to_string()))?;
        let connector = TlsConnector::from(Arc::new(self.client_config()?));

        let connect = async {
            let tcp = TcpStream::connect((host, port))
                .await
                .map_err(|e| ProbeError::Tls(format!("connect failed: {}", e)))?;
            match connector.connect(server_name, tcp).await {
                Ok(stream) => Ok(Some(stream)),
                Err(e) if is_legacy_rejection(&e) => Ok(None),
                Err(e) => Err(ProbeError::Tls(format!("handshake failed: {}", e))),
            }
        };
        let Some(stream) = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| ProbeError::Timeout)??
        else {
            return Ok(None);
        };

        let (_, connection) = stream.get_ref();
        let certs = connection
            .peer_certificates()
            .map(|certs| certs.iter().map(|c| c.clone().into_owned()).collect())
            .unwrap_or_default();
        Ok(Some(Handshake {
            certs,
            protocol: connection.protocol_version(),
        }))
    }
}

struct Handshake {
    certs: Vec<CertificateDer<'static>>,
    protocol: Option<ProtocolVersion>,
}

/// 握手失败是否因为服务器只支持 TLS 1.2 之前的版本
pub fn is_legacy_rejection(err: &io::Error) -> bool {
    let Some(tls_err) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
    else {
        return false;
    };
    matches!(
        tls_err,
        rustls::Error::AlertReceived(AlertDescription::ProtocolVersion)
            | rustls::Error::PeerIncompatible(PeerIncompatible::ServerDoesNotSupportTls12Or13)
    )
}

#[async_trait]
impl Probe for TlsProbe {
    type Output = TlsResult;

    async fn run(&self, target: &ProbeTarget) -> Result<TlsResult, ProbeError> {
        let (host, port) = tls_endpoint(target)?;
        let Some(Handshake { certs, protocol }) = self.handshake(&host, port).await? else {
            warn!(host = %host, port, "Server only accepts TLS versions before 1.2");
            return Ok(TlsResult::legacy_only());
        };

        let server_name =
            ServerName::try_from(host.clone()).map_err(|e| ProbeError::Tls(e.to_string()))?;
        let mut result = evaluate_chain(
            &certs,
            &server_name,
            &self.roots,
            &self.provider,
            UnixTime::now(),
        )?;
        result.protocol = protocol.map(protocol_name);
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "tls"
    }
}

fn tls_endpoint(target: &ProbeTarget) -> Result<(String, u16), ProbeError> {
    match Url::parse(&target.url) {
        Ok(url) if url.scheme() == "https" => {
            let host = url
                .host_str()
                .map(str::to_string)
                .unwrap_or_else(|| target.domain.clone());
            Ok((host, url.port().unwrap_or(443)))
        }
        _ => Ok((target.domain.clone(), 443)),
    }
}

/// 协议版本的展示名称
pub fn protocol_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        ProtocolVersion::TLSv1_1 => "TLSv1.1".to_string(),
        ProtocolVersion::TLSv1_0 => "TLSv1.0".to_string(),
        ProtocolVersion::SSLv3 => "SSLv3".to_string(),
        other => format!("{:?}", other),
    }
}

fn is_time_error(err: &rustls::Error) -> bool {
    match err {
        rustls::Error::InvalidCertificate(cert_err) => {
            // Covers both the plain variants and their *Context forms
            let name = format!("{:?}", cert_err);
            name.starts_with("Expired") || name.starts_with("NotValidYet")
        }
        _ => false,
    }
}

fn is_expired(err: &rustls::Error) -> bool {
    matches!(err, rustls::Error::InvalidCertificate(cert_err)
        if format!("{:?}", cert_err).starts_with("Expired"))
}

fn is_unknown_issuer(err: &rustls::Error) -> bool {
    matches!(
        err,
        rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer)
    )
}

fn offset_time(now: UnixTime, days: i64) -> UnixTime {
    let secs = now.as_secs() as i64 + days * SECONDS_PER_DAY;
    UnixTime::since_unix_epoch(Duration::from_secs(secs.max(0) as u64))
}

/// 在 [lo, hi] 内查找满足 `valid_at` 的最大天数偏移
///
/// 要求 `valid_at(lo)` 成立且谓词单调
pub fn last_valid_day(mut lo: i64, mut hi: i64, valid_at: impl Fn(i64) -> bool) -> i64 {
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if valid_at(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// 评估握手得到的证书链
pub fn evaluate_chain(
    certs: &[CertificateDer<'_>],
    server_name: &ServerName<'_>,
    roots: &RootCertStore,
    provider: &CryptoProvider,
    now: UnixTime,
) -> Result<TlsResult, ProbeError> {
    let (end_entity, intermediates) = certs
        .split_first()
        .ok_or_else(|| ProbeError::Tls("server presented no certificate".to_string()))?;
    let parsed =
        ParsedCertificate::try_from(end_entity).map_err(|e| ProbeError::Tls(e.to_string()))?;
    let algorithms = provider.signature_verification_algorithms.all;

    let verify_at = |time: UnixTime| {
        verify_server_cert_signed_by_trust_anchor(&parsed, roots, intermediates, time, algorithms)
    };
    let within_validity = |days: i64| match verify_at(offset_time(now, days)) {
        Ok(()) => true,
        Err(e) => !is_time_error(&e),
    };

    let current = verify_at(now);
    let expired = current.as_ref().err().is_some_and(is_expired);

    let (days_until_expiry, chain) = if expired {
        if within_validity(-EXPIRY_SEARCH_DAYS) {
            let last = last_valid_day(-EXPIRY_SEARCH_DAYS, -1, within_validity);
            // Judge trust at the last instant the certificate was still valid
            (Some(last), verify_at(offset_time(now, last)))
        } else {
            (None, current)
        }
    } else if current.as_ref().err().is_some_and(is_time_error) {
        // Not yet valid
        (None, current)
    } else {
        let days = last_valid_day(0, EXPIRY_SEARCH_DAYS, within_validity);
        (Some(days), current)
    };

    let self_signed = chain.as_ref().err().is_some_and(is_unknown_issuer) && intermediates.is_empty();
    let verification_error = match (&chain, expired) {
        (_, true) => Some("certificate expired".to_string()),
        (Err(e), false) => Some(e.to_string()),
        (Ok(()), false) => None,
    };

    Ok(TlsResult {
        trusted: chain.is_ok(),
        expired,
        hostname_matches: verify_server_name(&parsed, server_name).is_ok(),
        self_signed,
        days_until_expiry,
        protocol: None,
        verification_error,
        legacy_only: false,
    })
}
