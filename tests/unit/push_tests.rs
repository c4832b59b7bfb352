/*!
 * Tests for push payloads and the mock notifier
 */

use confessions::app_config::PushConfig;
use confessions::push::mock::MockNotifier;
use confessions::push::{PushMessage, PushNotifier};

fn message(to: &str) -> PushMessage {
    PushMessage::new(PushConfig::default().approved, to)
}

#[test]
fn test_pushMessage_fromDefaultTemplate_shouldCarryObservedCopy() {
    let value = serde_json::to_value(message("tok")).unwrap();

    assert_eq!(value["to"], "tok");
    assert_eq!(value["notification"]["click_action"], "http://fptu.tech/my-confess");
    assert_eq!(
        value["notification"]["icon"],
        "https://fptu.tech/assets/images/fptuhcm-confessions.png"
    );
}

#[tokio::test]
async fn test_mockNotifier_working_shouldRecordMessages() {
    let notifier = MockNotifier::working();

    notifier.send(&message("a")).await.unwrap();
    notifier.send(&message("b")).await.unwrap();

    assert_eq!(notifier.attempts(), 2);
    let sent: Vec<String> = notifier.sent().into_iter().map(|m| m.to).collect();
    assert_eq!(sent, vec!["a", "b"]);
}

#[tokio::test]
async fn test_mockNotifier_failing_shouldRecordNothing() {
    let notifier = MockNotifier::failing();

    assert!(notifier.send(&message("a")).await.is_err());
    assert_eq!(notifier.attempts(), 1);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_mockNotifier_failingFor_shouldOnlyRejectThatToken() {
    let notifier = MockNotifier::failing_for("bad");

    assert!(notifier.send(&message("bad")).await.is_err());
    assert!(notifier.send(&message("good")).await.is_ok());
    assert_eq!(notifier.sent().len(), 1);
}
