//! Protocol detectors, grounded on
//! `protocol/detect/detector/detector.go`'s `ProtocolDetector`
//! interface. Detectors are required to have disjoint acceptance sets;
//! no crate in the workspace pulls in a regex engine, so matching here
//! is a handful of `starts_with` checks on the leading bytes instead.

pub trait ProtocolDetector: Send + Sync {
    fn protocol_name(&self) -> &'static str;
    fn is_match(&self, data: &[u8]) -> bool;

    /// A banner to write during the probe phase, for protocols whose
    /// client speaks first only after seeing one (FTP). `None` for
    /// protocols the client always speaks first on (HTTP).
    fn probe(&self) -> Option<&'static [u8]> {
        None
    }
}

pub struct HttpDetector;

const HTTP_METHODS: &[&[u8]] = &[
    b"GET ", b"POST ", b"PUT ", b"DELETE ", b"HEAD ", b"OPTIONS ", b"PATCH ", b"CONNECT ", b"TRACE ",
];

impl ProtocolDetector for HttpDetector {
    fn protocol_name(&self) -> &'static str {
        "http"
    }

    fn is_match(&self, data: &[u8]) -> bool {
        HTTP_METHODS.iter().any(|method| data.starts_with(method))
    }
}

pub struct FtpDetector;

impl ProtocolDetector for FtpDetector {
    fn protocol_name(&self) -> &'static str {
        "ftp"
    }

    fn is_match(&self, data: &[u8]) -> bool {
        data.starts_with(b"USER ") || data.starts_with(b"AUTH TLS")
    }

    fn probe(&self) -> Option<&'static [u8]> {
        Some(b"220 FTP Server\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_matches_leading_method_verbs() {
        let detector = HttpDetector;
        assert!(detector.is_match(b"GET /index.html HTTP/1.1\r\n"));
        assert!(detector.is_match(b"POST /upload HTTP/1.1\r\n"));
        assert!(!detector.is_match(b"USER anonymous\r\n"));
    }

    #[test]
    fn ftp_matches_user_or_auth_tls() {
        let detector = FtpDetector;
        assert!(detector.is_match(b"USER anonymous\r\n"));
        assert!(detector.is_match(b"AUTH TLS\r\n"));
        assert!(!detector.is_match(b"GET / HTTP/1.1\r\n"));
        assert_eq!(detector.probe(), Some(&b"220 FTP Server\r\n"[..]));
    }

    #[test]
    fn detectors_have_disjoint_acceptance_on_each_others_banners() {
        let http = HttpDetector;
        let ftp = FtpDetector;
        assert!(!http.is_match(ftp.probe().unwrap()));
    }
}
