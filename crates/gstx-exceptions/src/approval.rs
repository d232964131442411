//! # Approval Workflow
//!
//! Master-data misses and override requests flow through one queue. Each
//! request type has its own auto-approval rule; what auto-approval clears
//! is applied to the master tables immediately, everything else waits for a
//! human decision and a notification goes out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use gstx_core::{states, GstRate, Money, NotificationSink, Severity};
use gstx_masters::{
    ItemMasterRecord, ItemMasterTable, ItemMiss, LedgerMasterRecord, LedgerMasterTable, LedgerMiss,
};

/// Approval request classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// New SKU/ASIN → Final Goods mapping.
    ItemMapping,
    /// New channel/state → ledger mapping.
    LedgerMapping,
    /// GST rate override on a row.
    GstRateOverride,
    /// Invoice number/date override.
    InvoiceOverride,
}

impl RequestType {
    /// Return the string representation of this request type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ItemMapping => "item_mapping",
            Self::LedgerMapping => "ledger_mapping",
            Self::GstRateOverride => "gst_rate_override",
            Self::InvoiceOverride => "invoice_override",
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Waiting for a decision.
    Pending,
    /// Approved (by a human or auto-approval).
    Approved,
    /// Rejected.
    Rejected,
}

/// One approval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request identifier.
    pub id: Uuid,
    /// Request classification.
    pub request_type: RequestType,
    /// Type-specific payload.
    pub payload: serde_json::Value,
    /// Suggested value shown to the approver.
    pub suggested_value: String,
    /// Queue priority (`"low"`, `"medium"`, `"high"`).
    pub priority: String,
    /// Lifecycle status.
    pub status: ApprovalStatus,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When it was decided.
    pub decided_at: Option<DateTime<Utc>>,
    /// Who decided it (`"system_auto"` for auto-approvals).
    pub approver: Option<String>,
    /// Decision notes.
    pub notes: Option<String>,
}

impl ApprovalRequest {
    fn new(request_type: RequestType, payload: serde_json::Value, suggested: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_type,
            payload,
            suggested_value: suggested,
            priority: "medium".into(),
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
            approver: None,
            notes: None,
        }
    }
}

/// Outcome of processing one request through the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Cleared by an auto-approval rule and applied.
    AutoApproved {
        /// Why the rule cleared it.
        reason: String,
    },
    /// Queued for a human.
    Queued,
}

/// Tunable auto-approval policy.
#[derive(Debug, Clone)]
pub struct ApprovalRules {
    /// SKU prefixes cleared for auto item mapping.
    pub item_auto_prefixes: Vec<String>,
    /// Maximum estimated item value for auto approval.
    pub item_max_value: Money,
    /// Channel families cleared for auto ledger mapping.
    pub ledger_standard_channels: Vec<String>,
    /// Whether GST rate overrides may auto-approve at all.
    pub gst_rate_auto_approve: bool,
    /// Whether invoice format fixes auto-approve.
    pub invoice_auto_format_fix: bool,
}

impl Default for ApprovalRules {
    fn default() -> Self {
        Self {
            item_auto_prefixes: vec!["ABC".into(), "XYZ".into(), "DEF".into()],
            item_max_value: Money::from_paise(500_000),
            ledger_standard_channels: vec![
                "amazon".into(),
                "flipkart".into(),
                "pepperfry".into(),
            ],
            gst_rate_auto_approve: false,
            invoice_auto_format_fix: true,
        }
    }
}

/// The approval workflow engine.
#[derive(Debug)]
pub struct ApprovalEngine {
    rules: ApprovalRules,
    requests: Vec<ApprovalRequest>,
}

impl ApprovalEngine {
    /// Engine with the default policy.
    pub fn new() -> Self {
        Self::with_rules(ApprovalRules::default())
    }

    /// Engine with an explicit policy.
    pub fn with_rules(rules: ApprovalRules) -> Self {
        Self {
            rules,
            requests: Vec::new(),
        }
    }

    /// All requests raised through this engine.
    pub fn requests(&self) -> &[ApprovalRequest] {
        &self.requests
    }

    /// Pending requests only.
    pub fn pending(&self) -> Vec<&ApprovalRequest> {
        self.requests
            .iter()
            .filter(|r| r.status == ApprovalStatus::Pending)
            .collect()
    }

    /// Counts per status.
    pub fn summary(&self) -> (usize, usize, usize) {
        let mut pending = 0;
        let mut approved = 0;
        let mut rejected = 0;
        for request in &self.requests {
            match request.status {
                ApprovalStatus::Pending => pending += 1,
                ApprovalStatus::Approved => approved += 1,
                ApprovalStatus::Rejected => rejected += 1,
            }
        }
        (pending, approved, rejected)
    }

    /// Raise requests for item-resolution misses. Auto-approved ones land
    /// in the item master immediately.
    pub fn submit_item_misses(
        &mut self,
        misses: &[ItemMiss],
        items: &mut ItemMasterTable,
        sink: &dyn NotificationSink,
    ) -> Vec<ApprovalDecision> {
        misses
            .iter()
            .map(|miss| {
                let payload = json!({
                    "sku": miss.sku,
                    "asin": miss.asin,
                    "suggested_fg": miss.suggested_fg,
                    "gst_rate": 0.18,
                    "occurrences": miss.occurrences,
                });
                let mut request = ApprovalRequest::new(
                    RequestType::ItemMapping,
                    payload,
                    miss.suggested_fg.clone(),
                );

                let auto_reason = self.item_auto_reason(miss);
                let decision = match auto_reason {
                    Some(reason) => {
                        items.insert(
                            ItemMasterRecord::new(
                                (!miss.sku.is_empty()).then_some(miss.sku.as_str()),
                                (!miss.asin.is_empty()).then_some(miss.asin.as_str()),
                                miss.suggested_fg.clone(),
                                miss.suggested_rate_bps,
                            )
                            .approved("system_auto"),
                        );
                        self.mark_auto(&mut request, &reason);
                        ApprovalDecision::AutoApproved { reason }
                    }
                    None => {
                        notify_pending(sink, &request);
                        ApprovalDecision::Queued
                    }
                };
                self.requests.push(request);
                decision
            })
            .collect()
    }

    /// Raise requests for ledger-resolution misses.
    pub fn submit_ledger_misses(
        &mut self,
        misses: &[LedgerMiss],
        ledgers: &mut LedgerMasterTable,
        sink: &dyn NotificationSink,
    ) -> Vec<ApprovalDecision> {
        misses
            .iter()
            .map(|miss| {
                let payload = json!({
                    "channel": miss.channel,
                    "state_code": miss.state_code,
                    "suggested_ledger": miss.suggested_ledger,
                    "occurrences": miss.occurrences,
                });
                let mut request = ApprovalRequest::new(
                    RequestType::LedgerMapping,
                    payload,
                    miss.suggested_ledger.clone(),
                );

                let decision = match self.ledger_auto_reason(miss) {
                    Some((reason, ledger_name)) => {
                        ledgers.insert(
                            LedgerMasterRecord::new(
                                miss.channel.clone(),
                                miss.state_code.clone(),
                                ledger_name,
                            )
                            .approved("system_auto"),
                        );
                        self.mark_auto(&mut request, &reason);
                        ApprovalDecision::AutoApproved { reason }
                    }
                    None => {
                        notify_pending(sink, &request);
                        ApprovalDecision::Queued
                    }
                };
                self.requests.push(request);
                decision
            })
            .collect()
    }

    /// Raise a GST-rate override request.
    pub fn submit_gst_override(
        &mut self,
        proposed_rate: f64,
        context: serde_json::Value,
        sink: &dyn NotificationSink,
    ) -> ApprovalDecision {
        let mut request = ApprovalRequest::new(
            RequestType::GstRateOverride,
            json!({ "proposed_gst_rate": proposed_rate, "context": context }),
            format!("{proposed_rate}"),
        );
        let decision = if self.rules.gst_rate_auto_approve
            && GstRate::from_fraction(proposed_rate).is_some()
        {
            let reason = "proposed rate is a valid slab".to_string();
            self.mark_auto(&mut request, &reason);
            ApprovalDecision::AutoApproved { reason }
        } else {
            notify_pending(sink, &request);
            ApprovalDecision::Queued
        };
        self.requests.push(request);
        decision
    }

    /// Raise an invoice override request.
    pub fn submit_invoice_override(
        &mut self,
        override_type: &str,
        context: serde_json::Value,
        sink: &dyn NotificationSink,
    ) -> ApprovalDecision {
        let mut request = ApprovalRequest::new(
            RequestType::InvoiceOverride,
            json!({ "override_type": override_type, "context": context }),
            override_type.to_string(),
        );
        let decision = if override_type == "format_fix" && self.rules.invoice_auto_format_fix {
            let reason = "invoice format correction".to_string();
            self.mark_auto(&mut request, &reason);
            ApprovalDecision::AutoApproved { reason }
        } else {
            notify_pending(sink, &request);
            ApprovalDecision::Queued
        };
        self.requests.push(request);
        decision
    }

    /// Apply a human decision to a pending request. Approved master-data
    /// requests mutate the given tables.
    pub fn decide(
        &mut self,
        request_id: Uuid,
        approve: bool,
        approver: &str,
        notes: Option<String>,
        items: &mut ItemMasterTable,
        ledgers: &mut LedgerMasterTable,
    ) -> bool {
        let Some(request) = self
            .requests
            .iter_mut()
            .find(|r| r.id == request_id && r.status == ApprovalStatus::Pending)
        else {
            return false;
        };

        request.status = if approve {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        request.approver = Some(approver.to_string());
        request.decided_at = Some(Utc::now());
        request.notes = notes;

        if approve {
            match request.request_type {
                RequestType::ItemMapping => {
                    let sku = request.payload["sku"].as_str().unwrap_or("");
                    let asin = request.payload["asin"].as_str().unwrap_or("");
                    let fg = request.suggested_value.clone();
                    items.insert(
                        ItemMasterRecord::new(
                            (!sku.is_empty()).then_some(sku),
                            (!asin.is_empty()).then_some(asin),
                            fg,
                            1800,
                        )
                        .approved(approver),
                    );
                }
                RequestType::LedgerMapping => {
                    let channel = request.payload["channel"].as_str().unwrap_or("");
                    let state = request.payload["state_code"].as_str().unwrap_or("");
                    ledgers.insert(
                        LedgerMasterRecord::new(
                            channel,
                            state,
                            request.suggested_value.clone(),
                        )
                        .approved(approver),
                    );
                }
                // Overrides carry no master mutation; the decision record
                // itself is the artifact downstream stages consult.
                RequestType::GstRateOverride | RequestType::InvoiceOverride => {}
            }
        }
        true
    }

    fn item_auto_reason(&self, miss: &ItemMiss) -> Option<String> {
        if let Some(prefix) = miss.sku.get(..3) {
            if self
                .rules
                .item_auto_prefixes
                .iter()
                .any(|p| p.eq_ignore_ascii_case(prefix))
            {
                return Some(format!("known SKU prefix {prefix}"));
            }
        }
        None
    }

    fn ledger_auto_reason(&self, miss: &LedgerMiss) -> Option<(String, String)> {
        if !self
            .rules
            .ledger_standard_channels
            .iter()
            .any(|c| c == &miss.channel)
        {
            return None;
        }
        let state_name = states::state_name(&miss.state_code)?;
        let title = {
            let mut chars = miss.channel.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().to_string() + chars.as_str(),
                None => return None,
            }
        };
        let ledger = format!("{title} {state_name}");
        Some((format!("standard channel and known state: {ledger}"), ledger))
    }

    fn mark_auto(&self, request: &mut ApprovalRequest, reason: &str) {
        request.status = ApprovalStatus::Approved;
        request.approver = Some("system_auto".into());
        request.decided_at = Some(Utc::now());
        request.notes = Some(reason.to_string());
        tracing::info!(
            request_type = %request.request_type,
            reason,
            "request auto-approved"
        );
    }
}

impl Default for ApprovalEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn notify_pending(sink: &dyn NotificationSink, request: &ApprovalRequest) {
    sink.send(
        Severity::Warning,
        &format!("Approval required: {}", request.request_type),
        &json!({
            "request_id": request.id,
            "payload": request.payload,
            "suggested_value": request.suggested_value,
            "priority": request.priority,
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstx_core::TracingSink;

    fn item_miss(sku: &str) -> ItemMiss {
        ItemMiss {
            sku: sku.into(),
            asin: String::new(),
            suggested_fg: format!("{sku}_FG"),
            suggested_rate_bps: 1800,
            occurrences: 1,
        }
    }

    fn ledger_miss(channel: &str, state: &str) -> LedgerMiss {
        LedgerMiss {
            channel: channel.into(),
            state_code: state.into(),
            suggested_ledger: format!("{channel} Sales - {state}"),
            occurrences: 1,
        }
    }

    #[test]
    fn item_auto_approves_on_known_prefix() {
        let mut engine = ApprovalEngine::new();
        let mut items = ItemMasterTable::new();
        let decisions =
            engine.submit_item_misses(&[item_miss("ABC-123")], &mut items, &TracingSink);
        assert!(matches!(decisions[0], ApprovalDecision::AutoApproved { .. }));
        assert!(items.lookup("ABC-123", "").is_some());
        assert_eq!(engine.summary(), (0, 1, 0));
    }

    #[test]
    fn item_queues_on_unknown_prefix() {
        let mut engine = ApprovalEngine::new();
        let mut items = ItemMasterTable::new();
        let decisions =
            engine.submit_item_misses(&[item_miss("QQQ-1")], &mut items, &TracingSink);
        assert_eq!(decisions[0], ApprovalDecision::Queued);
        assert!(items.is_empty());
        assert_eq!(engine.pending().len(), 1);
    }

    #[test]
    fn ledger_auto_approves_standard_channel_known_state() {
        let mut engine = ApprovalEngine::new();
        let mut ledgers = LedgerMasterTable::new();
        let decisions =
            engine.submit_ledger_misses(&[ledger_miss("amazon", "HR")], &mut ledgers, &TracingSink);
        assert!(matches!(decisions[0], ApprovalDecision::AutoApproved { .. }));
        assert_eq!(
            ledgers.lookup("amazon", "HR").unwrap().ledger_name,
            "Amazon Haryana"
        );
    }

    #[test]
    fn ledger_queues_unknown_state() {
        let mut engine = ApprovalEngine::new();
        let mut ledgers = LedgerMasterTable::new();
        let decisions =
            engine.submit_ledger_misses(&[ledger_miss("amazon", "ZZ")], &mut ledgers, &TracingSink);
        assert_eq!(decisions[0], ApprovalDecision::Queued);
        assert!(ledgers.is_empty());
    }

    #[test]
    fn gst_override_never_auto_approves_by_default() {
        let mut engine = ApprovalEngine::new();
        let decision = engine.submit_gst_override(0.18, json!({}), &TracingSink);
        assert_eq!(decision, ApprovalDecision::Queued);

        let mut rules = ApprovalRules::default();
        rules.gst_rate_auto_approve = true;
        let mut engine = ApprovalEngine::with_rules(rules);
        assert!(matches!(
            engine.submit_gst_override(0.18, json!({}), &TracingSink),
            ApprovalDecision::AutoApproved { .. }
        ));
        assert_eq!(
            engine.submit_gst_override(0.15, json!({}), &TracingSink),
            ApprovalDecision::Queued
        );
    }

    #[test]
    fn invoice_override_auto_approves_format_fix_only() {
        let mut engine = ApprovalEngine::new();
        assert!(matches!(
            engine.submit_invoice_override("format_fix", json!({}), &TracingSink),
            ApprovalDecision::AutoApproved { .. }
        ));
        assert_eq!(
            engine.submit_invoice_override("date_adjustment", json!({}), &TracingSink),
            ApprovalDecision::Queued
        );
    }

    #[test]
    fn human_decision_applies_to_masters() {
        let mut engine = ApprovalEngine::new();
        let mut items = ItemMasterTable::new();
        let mut ledgers = LedgerMasterTable::new();
        engine.submit_item_misses(&[item_miss("QQQ-1")], &mut items, &TracingSink);
        let id = engine.pending()[0].id;

        assert!(engine.decide(id, true, "finance", None, &mut items, &mut ledgers));
        assert!(items.lookup("QQQ-1", "").is_some());
        assert_eq!(
            items.lookup("QQQ-1", "").unwrap().approved_by.as_deref(),
            Some("finance")
        );
        // Deciding twice is a no-op.
        assert!(!engine.decide(id, true, "finance", None, &mut items, &mut ledgers));
    }

    #[test]
    fn rejection_leaves_masters_untouched() {
        let mut engine = ApprovalEngine::new();
        let mut items = ItemMasterTable::new();
        let mut ledgers = LedgerMasterTable::new();
        engine.submit_item_misses(&[item_miss("QQQ-2")], &mut items, &TracingSink);
        let id = engine.pending()[0].id;
        engine.decide(id, false, "finance", Some("bad sku".into()), &mut items, &mut ledgers);
        assert!(items.is_empty());
        assert_eq!(engine.summary(), (0, 0, 1));
    }
}
