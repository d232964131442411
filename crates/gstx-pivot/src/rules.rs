//! # Pivot Rules
//!
//! Channel-specific pivot configuration: which dimensions group the data,
//! which measures are summed, and which business rules post-process the
//! aggregate.

use gstx_core::Channel;

/// Pivot configuration for one channel.
#[derive(Debug, Clone, Copy)]
pub struct PivotConfig {
    /// Whether `state_code` joins the grouping dimensions.
    pub include_state: bool,
    /// Drop groups whose taxable total is zero.
    pub exclude_zero_taxable: bool,
    /// Zero out CGST/SGST after aggregation (stock transfer reports).
    pub force_igst_only: bool,
    /// Whether return-adjusted quantities feed the quantity measure.
    pub handle_returns: bool,
}

/// The pivot configuration for a channel.
pub fn channel_pivot_config(channel: Channel) -> PivotConfig {
    match channel {
        Channel::AmazonMtr => PivotConfig {
            include_state: false,
            exclude_zero_taxable: true,
            force_igst_only: false,
            handle_returns: false,
        },
        Channel::AmazonStr => PivotConfig {
            include_state: false,
            exclude_zero_taxable: true,
            force_igst_only: true,
            handle_returns: false,
        },
        Channel::Flipkart => PivotConfig {
            include_state: true,
            exclude_zero_taxable: true,
            force_igst_only: false,
            handle_returns: false,
        },
        Channel::Pepperfry => PivotConfig {
            include_state: false,
            exclude_zero_taxable: true,
            force_igst_only: false,
            handle_returns: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_is_igst_only() {
        assert!(channel_pivot_config(Channel::AmazonStr).force_igst_only);
        assert!(!channel_pivot_config(Channel::AmazonMtr).force_igst_only);
    }

    #[test]
    fn flipkart_groups_by_state() {
        assert!(channel_pivot_config(Channel::Flipkart).include_state);
    }

    #[test]
    fn all_channels_drop_zero_taxable() {
        for ch in Channel::all() {
            assert!(channel_pivot_config(*ch).exclude_zero_taxable);
        }
    }
}
