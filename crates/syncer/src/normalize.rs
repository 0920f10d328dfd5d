use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tonsync_primitives::LedgerTransaction;
use tonsync_tonio::{MsgKind, TonTransaction};

use crate::{encode_tx_hash, errors::SyncError};

const NANOTON_SCALE: u32 = 9;

/// Maps a page of raw chain transactions onto ledger rows.
///
/// The page arrives newest first and is traversed in reverse so rows land
/// in increasing `lt` order. Each chain transaction yields a principal row
/// and, when any fees were charged, a second row debiting them.
pub(crate) fn normalize_transactions(
    page: &[TonTransaction],
    account_id: i64,
    asset_id: i64,
) -> Result<Vec<LedgerTransaction>, SyncError> {
    let mut out = Vec::with_capacity(page.len() * 2);

    for tx in page.iter().rev() {
        let parsed = parse_tx(tx)?;

        out.push(LedgerTransaction {
            account_id,
            asset_id,
            category_id: 0,
            merchant: parsed.merchant.clone(),
            amount: parsed.amount,
            comment: parsed.comment.clone(),
            crypto_hash: Some(parsed.hash.clone()),
            crypto_ton_lt: Some(tx.lt),
            effective_at: parsed.effective_at,
        });

        let fee = -parsed.fee;
        if fee.is_zero() {
            continue;
        }

        out.push(LedgerTransaction {
            account_id,
            asset_id,
            category_id: 0,
            merchant: parsed.merchant,
            amount: fee,
            comment: parsed.comment,
            crypto_hash: Some(parsed.hash),
            crypto_ton_lt: Some(tx.lt),
            effective_at: parsed.effective_at,
        });
    }

    Ok(out)
}

struct ParsedTx {
    merchant: String,
    comment: String,
    hash: String,
    amount: Decimal,
    fee: Decimal,
    effective_at: DateTime<Utc>,
}

fn parse_tx(tx: &TonTransaction) -> Result<ParsedTx, SyncError> {
    let effective_at =
        DateTime::from_timestamp(tx.now as i64, 0).ok_or(SyncError::Timestamp(tx.now))?;
    let hash = encode_tx_hash(&tx.hash);

    let mut fee_nano = tx.total_fees;
    let mut amount = Decimal::ZERO;
    let mut comment = String::new();
    let mut merchant = String::new();

    for msg in &tx.out_msgs {
        if msg.kind != MsgKind::Internal {
            continue;
        }

        // forwarding fees ride on the message, not on the transaction total
        fee_nano += msg.ihr_fee + msg.fwd_fee;
        amount -= nano_to_ton(msg.amount);
        comment = msg.comment.clone();
        merchant = msg.dest.clone();
    }

    // an internal inbound message overrides whatever the out loop derived;
    // in practice a transaction carries value one way only
    if let Some(msg) = &tx.in_msg {
        if msg.kind == MsgKind::Internal {
            amount = nano_to_ton(msg.amount);
            merchant = msg.src.clone();
            comment = msg.comment.clone();
        }
    }

    Ok(ParsedTx {
        merchant,
        comment,
        hash,
        amount,
        fee: nano_to_ton(fee_nano),
        effective_at,
    })
}

/// Exact nanoton to whole-TON conversion; never goes through floats.
fn nano_to_ton(nano: u128) -> Decimal {
    Decimal::from_i128_with_scale(nano as i128, NANOTON_SCALE).normalize()
}

#[cfg(test)]
mod test {
    use tonsync_tonio::TonMessage;

    use super::*;

    fn internal_msg(src: &str, dest: &str, amount: u128) -> TonMessage {
        TonMessage {
            kind: MsgKind::Internal,
            src: src.to_string(),
            dest: dest.to_string(),
            amount,
            ihr_fee: 0,
            fwd_fee: 0,
            comment: String::new(),
        }
    }

    fn chain_tx(lt: u64, total_fees: u128) -> TonTransaction {
        TonTransaction {
            hash: vec![lt as u8; 32],
            lt,
            now: 1_700_000_000,
            total_fees,
            in_msg: None,
            out_msgs: vec![],
            prev_tx_hash: vec![],
            prev_tx_lt: 0,
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn incoming_value_is_credited_from_sender() {
        let mut tx = chain_tx(100, 0);
        let mut msg = internal_msg("EQsender", "EQme", 1_500_000_000);
        msg.comment = "thanks".to_string();
        tx.in_msg = Some(msg);

        let rows = normalize_transactions(&[tx], 1, 5).unwrap();
        assert_eq!(rows.len(), 1, "no fee row when nothing was charged");
        assert_eq!(rows[0].amount, dec("1.5"));
        assert_eq!(rows[0].merchant, "EQsender");
        assert_eq!(rows[0].comment, "thanks");
        assert_eq!(rows[0].asset_id, 5);
        assert_eq!(rows[0].crypto_ton_lt, Some(100));
    }

    #[test]
    fn outgoing_value_is_debited_with_forwarding_fees() {
        let mut tx = chain_tx(100, 1_000_000);
        let mut msg = internal_msg("EQme", "EQshop", 2_000_000_000);
        msg.ihr_fee = 500_000;
        msg.fwd_fee = 1_500_000;
        msg.comment = "order 42".to_string();
        tx.out_msgs = vec![msg];

        let rows = normalize_transactions(&[tx], 1, 0).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].amount, dec("-2"));
        assert_eq!(rows[0].merchant, "EQshop");
        assert_eq!(rows[0].comment, "order 42");

        // fee row: total 1_000_000 + ihr 500_000 + fwd 1_500_000 nanotons
        assert_eq!(rows[1].amount, dec("-0.003"));
        assert_eq!(rows[1].merchant, "EQshop");
        assert_eq!(rows[1].crypto_hash, rows[0].crypto_hash);
    }

    #[test]
    fn fee_row_present_iff_fees_charged() {
        let mut with_fee = chain_tx(10, 7);
        with_fee.in_msg = Some(internal_msg("EQa", "EQb", 1));
        let rows = normalize_transactions(&[with_fee], 1, 0).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].amount, dec("-0.000000007"));

        let without_fee = chain_tx(10, 0);
        let rows = normalize_transactions(&[without_fee], 1, 0).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn last_outgoing_message_wins() {
        let mut tx = chain_tx(100, 0);
        let mut first = internal_msg("EQme", "EQfirst", 1_000_000_000);
        first.comment = "first".to_string();
        let mut second = internal_msg("EQme", "EQsecond", 500_000_000);
        second.comment = "second".to_string();
        tx.out_msgs = vec![first, second];

        let rows = normalize_transactions(&[tx], 1, 0).unwrap();
        // amounts accumulate, merchant and comment do not
        assert_eq!(rows[0].amount, dec("-1.5"));
        assert_eq!(rows[0].merchant, "EQsecond");
        assert_eq!(rows[0].comment, "second");
    }

    #[test]
    fn internal_inbound_overrides_out_derivation() {
        let mut tx = chain_tx(100, 0);
        tx.out_msgs = vec![internal_msg("EQme", "EQshop", 2_000_000_000)];
        tx.in_msg = Some(internal_msg("EQsender", "EQme", 300_000_000));

        let rows = normalize_transactions(&[tx], 1, 0).unwrap();
        assert_eq!(rows[0].amount, dec("0.3"));
        assert_eq!(rows[0].merchant, "EQsender");
    }

    #[test]
    fn external_messages_are_ignored() {
        let mut tx = chain_tx(100, 0);
        tx.in_msg = Some(TonMessage {
            kind: MsgKind::ExternalIn,
            src: String::new(),
            dest: "EQme".to_string(),
            amount: 0,
            ihr_fee: 0,
            fwd_fee: 0,
            comment: String::new(),
        });

        let rows = normalize_transactions(&[tx], 1, 0).unwrap();
        assert_eq!(rows[0].amount, Decimal::ZERO);
        assert_eq!(rows[0].merchant, "");
    }

    #[test]
    fn newest_first_page_lands_in_ascending_lt_order() {
        let page = vec![chain_tx(100, 0), chain_tx(80, 0), chain_tx(60, 0)];
        let rows = normalize_transactions(&page, 1, 0).unwrap();
        let lts: Vec<_> = rows.iter().filter_map(|r| r.crypto_ton_lt).collect();
        assert_eq!(lts, vec![60, 80, 100]);
    }

    #[test]
    fn nanoton_conversion_is_exact() {
        assert_eq!(nano_to_ton(1_500_000_000), dec("1.5"));
        assert_eq!(nano_to_ton(1), dec("0.000000001"));
        assert_eq!(nano_to_ton(0), Decimal::ZERO);
        assert_eq!(
            nano_to_ton(123_456_789_123_456_789),
            dec("123456789.123456789")
        );
    }
}
