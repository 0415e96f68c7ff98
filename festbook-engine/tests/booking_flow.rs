use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use festbook_core::{ContactInfo, EventInfo, SeatType};
use festbook_engine::{
    BookingEngine, EngineError, EngineRules, InMemoryBookingStore, InMemoryCatalog, PromoRegistry,
    Promotion,
};

fn rules(ttl_seconds: u64) -> EngineRules {
    EngineRules {
        hold_ttl_seconds: ttl_seconds,
        tax_rate: 0.18,
        service_fee: 50.0,
        amount_tolerance: 0.01,
        max_tickets_per_session: 10,
        retention_seconds: 3600,
    }
}

fn setup(total_general: u32, ttl_seconds: u64) -> (Arc<BookingEngine>, Uuid) {
    let catalog = Arc::new(InMemoryCatalog::new());
    let event = EventInfo::with_base_price(
        "Spring Fest 2026",
        "Open Air Theatre",
        Utc::now() + chrono::Duration::days(30),
        100.0,
        &[(SeatType::General, total_general), (SeatType::Vip, 20)],
    );
    let event_id = event.id;
    catalog.insert(event);

    let engine = BookingEngine::new(
        catalog,
        Arc::new(InMemoryBookingStore::new()),
        Arc::new(PromoRegistry::new()),
        rules(ttl_seconds),
    );
    (engine, event_id)
}

fn contact() -> ContactInfo {
    ContactInfo {
        name: "Priya Sharma".to_string(),
        email: "priya@college.edu".to_string(),
        phone: "9876543210".to_string(),
    }
}

fn promo(event_id: Uuid, code: &str, percent: f64) -> Promotion {
    Promotion {
        code: code.to_string(),
        event_id,
        discount_percent: percent,
        valid_from: Utc::now() - chrono::Duration::days(1),
        valid_until: Utc::now() + chrono::Duration::days(30),
        seat_types: Vec::new(),
        min_quantity: 1,
        is_active: true,
    }
}

#[tokio::test]
async fn test_full_booking_flow_with_promo() {
    let (engine, event_id) = setup(100, 900);
    engine.register_promotion(promo(event_id, "FEST10", 10.0));

    let session = engine.start_session(event_id).await.unwrap();
    let hold = engine.select_seats(session.id, SeatType::General, 3).await.unwrap();
    assert!(hold.expires_at > Utc::now());

    let avail = engine.availability(event_id, SeatType::General).await.unwrap();
    assert_eq!(avail.held, 3);
    assert_eq!(avail.available, 97);

    let quote = engine
        .submit_details(session.id, contact(), Some("FEST10".to_string()))
        .await
        .unwrap();
    // Unit 100 x 3, 10% off, 18% tax, fee 50.
    assert!((quote.total - 368.6).abs() < 1e-9);

    let booking = engine
        .confirm_payment(session.id, "pay_abc123", quote.total)
        .await
        .unwrap();
    assert_eq!(booking.quantity, 3);
    assert!(booking.reference.starts_with("BK"));
    assert_eq!(booking.user_email, "priya@college.edu");

    let avail = engine.availability(event_id, SeatType::General).await.unwrap();
    assert_eq!(avail.confirmed, 3);
    assert_eq!(avail.held, 0);
    assert_eq!(avail.available, 97);

    assert_eq!(engine.session(session.id).unwrap().step.name(), "CONFIRMED");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_holds_never_oversell() {
    let (engine, event_id) = setup(7, 900);

    let s1 = engine.start_session(event_id).await.unwrap();
    let s2 = engine.start_session(event_id).await.unwrap();

    let e1 = Arc::clone(&engine);
    let e2 = Arc::clone(&engine);
    let t1 = tokio::spawn(async move { e1.select_seats(s1.id, SeatType::General, 5).await });
    let t2 = tokio::spawn(async move { e2.select_seats(s2.id, SeatType::General, 5).await });

    let (r1, r2) = (t1.await.unwrap(), t2.await.unwrap());

    // Exactly one wins.
    assert_eq!(r1.is_ok() as u32 + r2.is_ok() as u32, 1);
    let loser = if r1.is_err() { r1.unwrap_err() } else { r2.unwrap_err() };
    assert!(matches!(
        loser,
        EngineError::InsufficientSeats { requested: 5, available: 2 }
    ));

    let avail = engine.availability(event_id, SeatType::General).await.unwrap();
    assert_eq!(avail.held, 5);
    assert_eq!(avail.available, 2);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_releases_seats_and_expires_session() {
    let (engine, event_id) = setup(10, 1);

    let session = engine.start_session(event_id).await.unwrap();
    engine.select_seats(session.id, SeatType::General, 4).await.unwrap();
    assert_eq!(
        engine.availability(event_id, SeatType::General).await.unwrap().available,
        6
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    // Let the expiry event reach the session listener.
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }

    let avail = engine.availability(event_id, SeatType::General).await.unwrap();
    assert_eq!(avail.available, 10);
    assert_eq!(avail.held, 0);
    assert_eq!(engine.session(session.id).unwrap().step.name(), "EXPIRED");

    // Paying against the expired hold fails cleanly.
    let err = engine
        .confirm_payment(session.id, "pay_late", 100.0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Session(_)));
}

#[tokio::test]
async fn test_finalization_is_idempotent() {
    let (engine, event_id) = setup(10, 900);

    let session = engine.start_session(event_id).await.unwrap();
    let hold = engine.select_seats(session.id, SeatType::General, 2).await.unwrap();
    let quote = engine.submit_details(session.id, contact(), None).await.unwrap();

    let first = engine
        .confirm_payment(session.id, "pay_once", quote.total)
        .await
        .unwrap();
    // Duplicate gateway callback for the same hold.
    let second = engine
        .payment_callback(hold.id, "pay_once", quote.total)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.reference, second.reference);

    let avail = engine.availability(event_id, SeatType::General).await.unwrap();
    assert_eq!(avail.confirmed, 2);
    assert_eq!(avail.available, 8);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_duplicate_callbacks_resolve_to_one_booking() {
    let (engine, event_id) = setup(100, 900);

    for round in 0..10u32 {
        let session = engine.start_session(event_id).await.unwrap();
        let hold = engine.select_seats(session.id, SeatType::General, 1).await.unwrap();
        let quote = engine.submit_details(session.id, contact(), None).await.unwrap();

        let (e1, e2) = (Arc::clone(&engine), Arc::clone(&engine));
        let (hold_id, total) = (hold.id, quote.total);
        let reference = format!("pay_dup_{}", round);
        let (ref1, ref2) = (reference.clone(), reference);
        let t1 = tokio::spawn(async move { e1.payment_callback(hold_id, &ref1, total).await });
        let t2 = tokio::spawn(async move { e2.payment_callback(hold_id, &ref2, total).await });

        let (b1, b2) = (t1.await.unwrap().unwrap(), t2.await.unwrap().unwrap());

        // The gateway must see one booking no matter how the deliveries race.
        assert_eq!(b1.id, b2.id);
        assert_eq!(b1.reference, b2.reference);
    }

    let avail = engine.availability(event_id, SeatType::General).await.unwrap();
    assert_eq!(avail.confirmed, 10);
    assert_eq!(avail.held, 0);
}

#[tokio::test]
async fn test_amount_mismatch_leaves_everything_untouched() {
    let (engine, event_id) = setup(10, 900);

    let session = engine.start_session(event_id).await.unwrap();
    let hold = engine.select_seats(session.id, SeatType::General, 2).await.unwrap();
    let quote = engine.submit_details(session.id, contact(), None).await.unwrap();

    let err = engine
        .confirm_payment(session.id, "pay_forged", quote.total - 20.0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AmountMismatch { .. }));

    // Hold still live, ledger unchanged, session still at PAYMENT.
    assert!(engine.hold(hold.id).unwrap().state.is_live());
    let avail = engine.availability(event_id, SeatType::General).await.unwrap();
    assert_eq!(avail.held, 2);
    assert_eq!(avail.confirmed, 0);
    assert_eq!(engine.session(session.id).unwrap().step.name(), "PAYMENT");

    // The correct amount still goes through.
    let booking = engine
        .confirm_payment(session.id, "pay_real", quote.total)
        .await
        .unwrap();
    assert_eq!(booking.total_amount, quote.total);
}

#[tokio::test]
async fn test_insufficient_seats_keeps_session_selecting() {
    let (engine, event_id) = setup(3, 900);
    let session = engine.start_session(event_id).await.unwrap();

    let err = engine
        .select_seats(session.id, SeatType::General, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientSeats { .. }));
    assert_eq!(engine.session(session.id).unwrap().step.name(), "SELECTING");

    // A smaller retry succeeds.
    engine.select_seats(session.id, SeatType::General, 3).await.unwrap();
    assert_eq!(engine.session(session.id).unwrap().step.name(), "DETAILS");
}

#[tokio::test]
async fn test_reselection_replaces_hold_atomically() {
    let (engine, event_id) = setup(10, 900);
    let session = engine.start_session(event_id).await.unwrap();

    engine.select_seats(session.id, SeatType::General, 5).await.unwrap();
    engine.select_seats(session.id, SeatType::Vip, 2).await.unwrap();

    assert_eq!(engine.availability(event_id, SeatType::General).await.unwrap().held, 0);
    assert_eq!(engine.availability(event_id, SeatType::Vip).await.unwrap().held, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_reselection_holds_exactly_one_selection() {
    let (engine, event_id) = setup(100, 900);

    for _ in 0..10 {
        let session = engine.start_session(event_id).await.unwrap();

        let (e1, e2) = (Arc::clone(&engine), Arc::clone(&engine));
        let (s1, s2) = (session.id, session.id);
        let t1 = tokio::spawn(async move { e1.select_seats(s1, SeatType::General, 2).await });
        let t2 = tokio::spawn(async move { e2.select_seats(s2, SeatType::Vip, 3).await });
        let _ = (t1.await.unwrap(), t2.await.unwrap());

        // However the two selections interleave, only the attached hold may
        // be holding seats afterwards.
        let attached = engine
            .session(session.id)
            .unwrap()
            .step
            .hold_id()
            .map(|id| engine.hold(id).unwrap().quantity)
            .unwrap_or(0);
        let held_general = engine.availability(event_id, SeatType::General).await.unwrap().held;
        let held_vip = engine.availability(event_id, SeatType::Vip).await.unwrap().held;
        assert_eq!(held_general + held_vip, attached);

        engine.cancel_session(session.id).unwrap();
    }
}

#[tokio::test]
async fn test_promo_lapse_between_details_and_payment() {
    let (engine, event_id) = setup(10, 900);
    engine.register_promotion(promo(event_id, "FLASH20", 20.0));

    let session = engine.start_session(event_id).await.unwrap();
    engine.select_seats(session.id, SeatType::General, 2).await.unwrap();
    let quote = engine
        .submit_details(session.id, contact(), Some("FLASH20".to_string()))
        .await
        .unwrap();

    // The promotion is withdrawn before the user pays.
    let mut withdrawn = promo(event_id, "FLASH20", 20.0);
    withdrawn.is_active = false;
    engine.register_promotion(withdrawn);

    let err = engine
        .confirm_payment(session.id, "pay_x", quote.total)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Promo(_)));

    // Nothing was consumed; the user can resubmit without the code.
    let quote = engine.submit_details(session.id, contact(), None).await.unwrap();
    engine
        .confirm_payment(session.id, "pay_y", quote.total)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancel_session_releases_seats() {
    let (engine, event_id) = setup(10, 900);
    let session = engine.start_session(event_id).await.unwrap();
    engine.select_seats(session.id, SeatType::General, 4).await.unwrap();

    engine.cancel_session(session.id).unwrap();

    assert_eq!(engine.session(session.id).unwrap().step.name(), "CANCELLED");
    assert_eq!(engine.availability(event_id, SeatType::General).await.unwrap().available, 10);

    // Cancelling again is a no-op.
    engine.cancel_session(session.id).unwrap();
    assert_eq!(engine.availability(event_id, SeatType::General).await.unwrap().available, 10);
}

#[tokio::test]
async fn test_refund_returns_confirmed_seats() {
    let (engine, event_id) = setup(10, 900);
    let session = engine.start_session(event_id).await.unwrap();
    engine.select_seats(session.id, SeatType::General, 3).await.unwrap();
    let quote = engine.submit_details(session.id, contact(), None).await.unwrap();
    let booking = engine
        .confirm_payment(session.id, "pay_ref", quote.total)
        .await
        .unwrap();

    let refunded = engine.cancel_booking(booking.id, true).await.unwrap();
    assert_eq!(refunded.status, festbook_core::BookingStatus::Refunded);

    let avail = engine.availability(event_id, SeatType::General).await.unwrap();
    assert_eq!(avail.confirmed, 0);
    assert_eq!(avail.available, 10);
}
