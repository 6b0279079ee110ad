use crate::probe::{EchoTransport, ProbeError, ThroughputTransport, TransferMode, TransferReport};
use std::collections::VecDeque;
use std::time::Duration;

/// Scripted echo replies. `None` entries time out; once the script runs out
/// every further probe reports the host unreachable.
#[derive(Debug, Clone, Default)]
pub struct MockEcho {
    replies: VecDeque<Option<f64>>,
    calls: usize,
}

impl MockEcho {
    pub fn with_replies(replies: Vec<Option<f64>>) -> Self {
        Self {
            replies: replies.into(),
            calls: 0,
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl EchoTransport for MockEcho {
    fn echo(&mut self, host: &str, timeout: Duration) -> Result<f64, ProbeError> {
        self.calls += 1;
        match self.replies.pop_front() {
            Some(Some(rtt_ms)) => Ok(rtt_ms),
            Some(None) => Err(ProbeError::Timeout(timeout)),
            None => Err(ProbeError::Unreachable(host.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MockTransferBehavior {
    pub transfer_ok: bool,
    pub mbps: f64,
    pub retransmits: Option<u64>,
    pub jitter_ms: Option<f64>,
    pub lost_percent: Option<f64>,
}

impl MockTransferBehavior {
    pub fn ok(mbps: f64) -> Self {
        Self {
            transfer_ok: true,
            mbps,
            retransmits: None,
            jitter_ms: None,
            lost_percent: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            transfer_ok: false,
            mbps: 0.0,
            retransmits: None,
            jitter_ms: None,
            lost_percent: None,
        }
    }

    pub fn with_retransmits(mut self, retransmits: u64) -> Self {
        self.retransmits = Some(retransmits);
        self
    }

    pub fn with_datagram_stats(mut self, jitter_ms: f64, lost_percent: f64) -> Self {
        self.jitter_ms = Some(jitter_ms);
        self.lost_percent = Some(lost_percent);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockThroughput {
    tcp: MockTransferBehavior,
    udp: MockTransferBehavior,
    calls: usize,
}

impl MockThroughput {
    pub fn new(tcp: MockTransferBehavior, udp: MockTransferBehavior) -> Self {
        Self { tcp, udp, calls: 0 }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl ThroughputTransport for MockThroughput {
    fn transfer(
        &mut self,
        _host: &str,
        mode: TransferMode,
        duration: Duration,
    ) -> Result<TransferReport, ProbeError> {
        self.calls += 1;
        let behavior = match mode {
            TransferMode::Tcp => self.tcp,
            TransferMode::Udp => self.udp,
        };
        if !behavior.transfer_ok {
            return Err(ProbeError::Timeout(duration));
        }
        Ok(TransferReport {
            mbps: behavior.mbps,
            retransmits: behavior.retransmits,
            jitter_ms: behavior.jitter_ms,
            lost_percent: behavior.lost_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_script_runs_out_into_unreachable() {
        let mut echo = MockEcho::with_replies(vec![Some(3.0), None]);
        let timeout = Duration::from_millis(5);

        assert_eq!(echo.echo("gw", timeout).ok(), Some(3.0));
        assert!(matches!(echo.echo("gw", timeout), Err(ProbeError::Timeout(_))));
        let err = echo.echo("gw", timeout).unwrap_err();

        assert_eq!(err.to_string(), "host unreachable: gw");
        assert_eq!(echo.calls(), 3);
    }

    #[test]
    fn transfer_uses_behavior_for_mode() {
        let mut transport = MockThroughput::new(
            MockTransferBehavior::timeout(),
            MockTransferBehavior::ok(95.5).with_datagram_stats(0.4, 1.5),
        );

        let udp = transport
            .transfer("srv", TransferMode::Udp, Duration::from_secs(1))
            .expect("udp ok");

        assert_eq!(udp.mbps, 95.5);
        assert_eq!(udp.jitter_ms, Some(0.4));
        assert!(
            transport
                .transfer("srv", TransferMode::Tcp, Duration::from_secs(1))
                .is_err()
        );
    }
}
