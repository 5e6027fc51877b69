//! Alert Dispatcher — cooldown, channel selection, transport handoff
//!
//! Channel policy per severity:
//!
//! | Level    | Channels        |
//! |----------|-----------------|
//! | CRITICAL | SMS + email     |
//! | HIGH     | email           |
//! | MEDIUM   | in-app only     |
//! | LOW      | in-app only     |
//! | OK       | never dispatched (clears the cooldown entry) |
//!
//! Non-critical alerts for the same `(truck, alert_type)` are suppressed
//! inside the cooldown window. Transport failures are logged, never block
//! the pipeline, and do not update last-sent so the next cycle retries.

pub mod transport;

pub use transport::{AlertTransport, CaptureTransport, SmsAlertTransport, SmtpAlertTransport};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Alert severity, including the recovery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Ok,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Ok => write!(f, "OK"),
            AlertLevel::Low => write!(f, "LOW"),
            AlertLevel::Medium => write!(f, "MEDIUM"),
            AlertLevel::High => write!(f, "HIGH"),
            AlertLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// One alert flowing toward the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub truck_id: String,
    /// Stable kind used for cooldown keying, e.g. "battery_voltage"
    pub alert_type: String,
    pub level: AlertLevel,
    pub message: String,
    pub action: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// What the dispatcher did with an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handed to at least one transport (or the in-app feed)
    Dispatched,
    /// Suppressed by the cooldown window
    Cooldown,
    /// OK level — cooldown entry cleared, nothing sent
    Recovery,
    /// All transports failed; will retry next cycle
    TransportFailed,
}

/// Process-wide alert dispatcher.
///
/// The cooldown map and in-app feed are each guarded by a single mutex.
pub struct AlertDispatcher {
    cooldown: Duration,
    last_sent: Mutex<HashMap<(String, String), DateTime<Utc>>>,
    email: Option<Arc<dyn AlertTransport>>,
    sms: Option<Arc<dyn AlertTransport>>,
    /// In-app feed of everything dispatched (bounded)
    feed: Mutex<Vec<Alert>>,
    feed_capacity: usize,
}

impl AlertDispatcher {
    pub fn new(
        cooldown_minutes: i64,
        email: Option<Arc<dyn AlertTransport>>,
        sms: Option<Arc<dyn AlertTransport>>,
    ) -> Self {
        Self {
            cooldown: Duration::minutes(cooldown_minutes),
            last_sent: Mutex::new(HashMap::new()),
            email,
            sms,
            feed: Mutex::new(Vec::new()),
            feed_capacity: 500,
        }
    }

    /// Recent in-app alerts, newest last.
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.feed
            .lock()
            .map(|feed| {
                let skip = feed.len().saturating_sub(limit);
                feed[skip..].to_vec()
            })
            .unwrap_or_default()
    }

    /// Dispatch one alert according to the channel/cooldown policy.
    pub async fn dispatch(&self, alert: Alert, now: DateTime<Utc>) -> DispatchOutcome {
        let key = (alert.truck_id.clone(), alert.alert_type.clone());

        if alert.level == AlertLevel::Ok {
            // Recovery: clear the entry so the next escalation sends at once
            if let Ok(mut map) = self.last_sent.lock() {
                map.remove(&key);
            }
            return DispatchOutcome::Recovery;
        }

        if alert.level != AlertLevel::Critical {
            let suppressed = self
                .last_sent
                .lock()
                .ok()
                .and_then(|map| map.get(&key).copied())
                .is_some_and(|last| now - last < self.cooldown);
            if suppressed {
                return DispatchOutcome::Cooldown;
            }
        }

        let transports: Vec<&Arc<dyn AlertTransport>> = match alert.level {
            AlertLevel::Critical => self.sms.iter().chain(self.email.iter()).collect(),
            AlertLevel::High => self.email.iter().collect(),
            // MEDIUM / LOW stay in-app
            _ => Vec::new(),
        };

        let mut any_failure = false;
        let mut any_success = transports.is_empty();
        for t in transports {
            match t.send(&alert).await {
                Ok(()) => any_success = true,
                Err(e) => {
                    any_failure = true;
                    warn!(
                        truck_id = %alert.truck_id,
                        alert_type = %alert.alert_type,
                        transport = t.name(),
                        error = %e,
                        "Alert transport failed"
                    );
                }
            }
        }

        if !any_success && any_failure {
            // Nothing went out: leave last-sent untouched so the next
            // cycle retries immediately.
            return DispatchOutcome::TransportFailed;
        }

        if let Ok(mut map) = self.last_sent.lock() {
            map.insert(key, now);
        }
        if let Ok(mut feed) = self.feed.lock() {
            if feed.len() >= self.feed_capacity {
                feed.remove(0);
            }
            feed.push(alert.clone());
        }

        info!(
            truck_id = %alert.truck_id,
            alert_type = %alert.alert_type,
            level = %alert.level,
            "Alert dispatched"
        );
        DispatchOutcome::Dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn alert(level: AlertLevel) -> Alert {
        Alert {
            truck_id: "T001".to_string(),
            alert_type: "battery_voltage".to_string(),
            level,
            message: "Carga débil (12.9V)".to_string(),
            action: Some("Programar revisión de alternador".to_string()),
            timestamp: Utc::now(),
        }
    }

    fn dispatcher_with_capture() -> (AlertDispatcher, Arc<CaptureTransport>, Arc<CaptureTransport>)
    {
        let email = Arc::new(CaptureTransport::new());
        let sms = Arc::new(CaptureTransport::new());
        let dispatcher = AlertDispatcher::new(
            60,
            Some(email.clone() as Arc<dyn AlertTransport>),
            Some(sms.clone() as Arc<dyn AlertTransport>),
        );
        (dispatcher, email, sms)
    }

    #[tokio::test]
    async fn high_alert_respects_cooldown_window() {
        let (dispatcher, email, _) = dispatcher_with_capture();
        let t0 = Utc::now();

        // t=0: dispatches
        let outcome = dispatcher.dispatch(alert(AlertLevel::High), t0).await;
        assert_eq!(outcome, DispatchOutcome::Dispatched);

        // t=30min: suppressed
        let outcome = dispatcher
            .dispatch(alert(AlertLevel::High), t0 + Duration::minutes(30))
            .await;
        assert_eq!(outcome, DispatchOutcome::Cooldown);
        assert_eq!(email.sent_count(), 1);

        // t=61min: dispatches again
        let outcome = dispatcher
            .dispatch(alert(AlertLevel::High), t0 + Duration::minutes(61))
            .await;
        assert_eq!(outcome, DispatchOutcome::Dispatched);
        assert_eq!(email.sent_count(), 2);
    }

    #[tokio::test]
    async fn critical_always_dispatches_to_sms_and_email() {
        let (dispatcher, email, sms) = dispatcher_with_capture();
        let t0 = Utc::now();

        for i in 0..3 {
            let outcome = dispatcher
                .dispatch(alert(AlertLevel::Critical), t0 + Duration::minutes(i))
                .await;
            assert_eq!(outcome, DispatchOutcome::Dispatched);
        }
        assert_eq!(email.sent_count(), 3);
        assert_eq!(sms.sent_count(), 3);
    }

    #[tokio::test]
    async fn high_goes_to_email_only() {
        let (dispatcher, email, sms) = dispatcher_with_capture();
        dispatcher.dispatch(alert(AlertLevel::High), Utc::now()).await;
        assert_eq!(email.sent_count(), 1);
        assert_eq!(sms.sent_count(), 0);
    }

    #[tokio::test]
    async fn medium_stays_in_app() {
        let (dispatcher, email, sms) = dispatcher_with_capture();
        let outcome = dispatcher
            .dispatch(alert(AlertLevel::Medium), Utc::now())
            .await;
        assert_eq!(outcome, DispatchOutcome::Dispatched);
        assert_eq!(email.sent_count(), 0);
        assert_eq!(sms.sent_count(), 0);
        assert_eq!(dispatcher.recent_alerts(10).len(), 1);
    }

    #[tokio::test]
    async fn recovery_clears_cooldown_for_immediate_escalation() {
        let (dispatcher, email, _) = dispatcher_with_capture();
        let t0 = Utc::now();

        dispatcher.dispatch(alert(AlertLevel::High), t0).await;
        // OK arrives; nothing sent, cooldown entry cleared
        let outcome = dispatcher
            .dispatch(alert(AlertLevel::Ok), t0 + Duration::minutes(5))
            .await;
        assert_eq!(outcome, DispatchOutcome::Recovery);
        assert_eq!(email.sent_count(), 1);

        // Re-escalation 10 minutes later dispatches immediately
        let outcome = dispatcher
            .dispatch(alert(AlertLevel::High), t0 + Duration::minutes(10))
            .await;
        assert_eq!(outcome, DispatchOutcome::Dispatched);
        assert_eq!(email.sent_count(), 2);
    }

    #[tokio::test]
    async fn transport_failure_leaves_cooldown_open_for_retry() {
        let (dispatcher, email, _) = dispatcher_with_capture();
        let t0 = Utc::now();

        email.fail.store(true, Ordering::Relaxed);
        let outcome = dispatcher.dispatch(alert(AlertLevel::High), t0).await;
        assert_eq!(outcome, DispatchOutcome::TransportFailed);

        // Next cycle the transport recovers — no cooldown in the way
        email.fail.store(false, Ordering::Relaxed);
        let outcome = dispatcher
            .dispatch(alert(AlertLevel::High), t0 + Duration::minutes(1))
            .await;
        assert_eq!(outcome, DispatchOutcome::Dispatched);
        assert_eq!(email.sent_count(), 1);
    }
}
