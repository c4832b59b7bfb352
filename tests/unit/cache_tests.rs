/*!
 * Tests for the TTL cache
 */

use confessions::cache::{default_expiration, Expiration, TtlCache};
use std::time::Duration;

fn create_cache() -> TtlCache<String, i32> {
    TtlCache::new(Duration::from_secs(60), Duration::from_secs(60))
}

#[test]
fn test_get_withMissingKey_shouldReturnNone() {
    let cache = create_cache();
    assert!(cache.get(&"nope".to_string()).is_none());
}

#[test]
fn test_set_withDefaultExpiration_shouldBeReadable() {
    let cache = create_cache();

    cache.set("a".to_string(), 1, default_expiration());

    assert_eq!(cache.get(&"a".to_string()), Some(1));
    assert_eq!(cache.item_count(), 1);
}

#[test]
fn test_set_withSameKey_shouldReplaceValue() {
    let cache = create_cache();

    cache.set("a".to_string(), 1, Expiration::Never);
    cache.set("a".to_string(), 2, Expiration::Never);

    assert_eq!(cache.get(&"a".to_string()), Some(2));
    assert_eq!(cache.item_count(), 1);
}

#[test]
fn test_clone_shouldShareEntries() {
    let cache = create_cache();
    let handle = cache.clone();

    handle.set("shared".to_string(), 7, default_expiration());

    assert_eq!(cache.get(&"shared".to_string()), Some(7));
}

#[test]
fn test_delete_andFlush_shouldRemoveEntries() {
    let cache = create_cache();
    cache.set("a".to_string(), 1, Expiration::Never);
    cache.set("b".to_string(), 2, Expiration::Never);

    assert!(cache.delete(&"a".to_string()));
    assert!(!cache.delete(&"a".to_string()));
    assert_eq!(cache.item_count(), 1);

    cache.flush();
    assert_eq!(cache.item_count(), 0);
}

#[test]
fn test_get_withExpiredEntry_shouldReturnNone() {
    let cache = create_cache();
    cache.set("short".to_string(), 1, Expiration::After(Duration::from_millis(5)));
    cache.set("long".to_string(), 2, Expiration::Never);

    std::thread::sleep(Duration::from_millis(30));

    assert!(cache.get(&"short".to_string()).is_none());
    assert_eq!(cache.get(&"long".to_string()), Some(2));
    assert_eq!(cache.delete_expired(), 1);
    assert_eq!(cache.item_count(), 1);
}

#[tokio::test]
async fn test_startJanitor_shouldStopWhenAsked() {
    let cache: TtlCache<String, i32> =
        TtlCache::new(Duration::from_secs(60), Duration::from_millis(10));

    let janitor = cache.start_janitor();
    assert!(janitor.is_running());

    janitor.stop();
}
