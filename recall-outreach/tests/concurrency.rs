//! Duplicate-send guards and provider cache behaviour

mod common;

use chrono::Duration;
use common::{sequence, step, Harness};
use recall_core::{
    DelayType, MessageType, MessagingProvider, MessagingSettings, OutreachStatus,
    SmsProviderSetting,
};
use recall_messaging::MessagingConfig;
use recall_outreach::SequenceSummary;
use std::time::Duration as StdDuration;

async fn enrolled(h: &Harness) {
    let patient = h.add_patient("patient:1", "Ann One", 30, 400).await;
    let campaign = h
        .add_campaign(sequence(
            "campaign:seq",
            &h.tenant_id,
            vec![
                step("campaign:seq", 1, MessageType::Sms, DelayType::FixedDays, 0),
                step("campaign:seq", 2, MessageType::Sms, DelayType::FixedDays, 3),
            ],
        ))
        .await;
    h.service
        .enroll_patient_in_sequence(&campaign, &patient)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_overlapping_ticks_for_one_tenant_send_once() {
    let h = Harness::new().await;
    enrolled(&h).await;
    h.sms().set_delay(Some(StdDuration::from_millis(200)));

    let (first, second) = tokio::join!(
        h.service.process_sequences(&h.tenant_id),
        h.service.process_sequences(&h.tenant_id)
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first.processed + second.processed, 1);
    assert!(first == SequenceSummary::default() || second == SequenceSummary::default());
    assert_eq!(h.sms().sent().len(), 1);
    assert_eq!(h.store.all_logs().await.len(), 1);
}

#[tokio::test]
async fn test_claim_prevents_double_send_across_instances() {
    let h = Harness::new().await;
    enrolled(&h).await;
    h.sms().set_delay(Some(StdDuration::from_millis(200)));

    // Separate locks, shared store
    let other = h.sibling_service(MessagingConfig::default());

    let (first, second) = tokio::join!(
        h.service.process_sequences(&h.tenant_id),
        other.process_sequences(&h.tenant_id)
    );

    assert_eq!(first.unwrap().processed + second.unwrap().processed, 1);
    assert_eq!(h.sms().sent().len(), 1);

    let states = h.store.all_states().await;
    assert_eq!(states[0].current_step_number, 1);
    assert_eq!(states[0].next_scheduled_at, Some(h.now() + Duration::days(3)));
}

#[tokio::test]
async fn test_sequential_ticks_after_release_proceed() {
    let h = Harness::new().await;
    enrolled(&h).await;

    h.service.process_sequences(&h.tenant_id).await.unwrap();
    h.clock.advance(Duration::days(3));
    let summary = h.service.process_sequences(&h.tenant_id).await.unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(h.sms().sent().len(), 2);
}

#[tokio::test]
async fn test_client_cached_until_invalidated() {
    let h = Harness::new().await;
    let patient = h.add_patient("patient:1", "Ann One", 30, 400).await;
    let campaign = h
        .add_campaign(common::single_shot("campaign:yearend", &h.tenant_id, MessageType::Sms))
        .await;

    for _ in 0..2 {
        h.service
            .send_manual_outreach(&patient, &h.tenant_id, &campaign, MessageType::Sms)
            .await
            .unwrap();
    }
    assert_eq!(h.factory.builds(), 1);

    h.service.invalidate_messaging_config(&h.tenant_id);
    h.service
        .send_manual_outreach(&patient, &h.tenant_id, &campaign, MessageType::Sms)
        .await
        .unwrap();
    assert_eq!(h.factory.builds(), 2);
}

#[tokio::test]
async fn test_incomplete_custom_config_without_fallback_fails_and_logs() {
    let h = Harness::new().await;
    let patient = h.add_patient("patient:1", "Ann One", 30, 400).await;
    let campaign = h
        .add_campaign(common::single_shot("campaign:yearend", &h.tenant_id, MessageType::Sms))
        .await;

    let settings = MessagingSettings {
        sms_provider: SmsProviderSetting::CustomTwilio,
        sms_fallback_to_system: false,
        ..MessagingSettings::default()
    };
    let tenant = h
        .store
        .tenant(&h.tenant_id)
        .await
        .unwrap()
        .with_messaging(settings);
    h.store.insert_tenant(tenant).await;

    let result = h
        .service
        .send_manual_outreach(&patient, &h.tenant_id, &campaign, MessageType::Sms)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.provider, MessagingProvider::CustomTwilio);
    assert!(h.sms().sent().is_empty());

    let logs = h.store.all_logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, OutreachStatus::Failed);
    assert_eq!(logs[0].messaging_provider, Some(MessagingProvider::CustomTwilio));
}

#[tokio::test]
async fn test_incomplete_custom_config_with_fallback_uses_system() {
    let h = Harness::new().await;
    let patient = h.add_patient("patient:1", "Ann One", 30, 400).await;
    let campaign = h
        .add_campaign(common::single_shot("campaign:yearend", &h.tenant_id, MessageType::Sms))
        .await;

    let settings = MessagingSettings {
        sms_provider: SmsProviderSetting::CustomTwilio,
        sms_fallback_to_system: true,
        ..MessagingSettings::default()
    };
    let tenant = h
        .store
        .tenant(&h.tenant_id)
        .await
        .unwrap()
        .with_messaging(settings);
    h.store.insert_tenant(tenant).await;

    let result = h
        .service
        .send_manual_outreach(&patient, &h.tenant_id, &campaign, MessageType::Sms)
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.provider, MessagingProvider::System);
    assert_eq!(h.sms().sent().len(), 1);
}
