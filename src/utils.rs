use chrono::Utc;
use std::rc::{Rc, Weak};

pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Current time in milliseconds, as used for client-side ids.
pub fn millis_id() -> String {
    Utc::now().timestamp_millis().to_string()
}

/// `+` followed by at least one digit and nothing else.
pub fn is_phone_number(input: &str) -> bool {
    match input.strip_prefix('+') {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Wrap `f` so it only holds a weak handle on `owner`. Calls after the
/// owner is dropped are ignored, so widget callbacks never keep it alive.
pub fn with_weak<T, A, F>(owner: &Rc<T>, f: F) -> impl Fn(A) + 'static
where
    T: 'static,
    F: Fn(&Rc<T>, A) + 'static,
{
    let weak: Weak<T> = Rc::downgrade(owner);
    move |arg| {
        if let Some(owner) = weak.upgrade() {
            f(&owner, arg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn normalize_adds_scheme_only_when_missing() {
        assert_eq!(normalize_url(" example.com "), "https://example.com");
        assert_eq!(normalize_url("http://localhost:3000"), "http://localhost:3000");
    }

    #[test]
    fn phone_numbers_need_country_prefix() {
        assert!(is_phone_number("+1234567890"));
        assert!(!is_phone_number("1234567890"));
        assert!(!is_phone_number("+"));
        assert!(!is_phone_number("+12 34"));
    }

    #[test]
    fn weak_handlers_do_not_keep_the_owner_alive() {
        let owner = Rc::new(Cell::new(0));
        let handler = with_weak(&owner, |o: &Rc<Cell<i32>>, n: i32| o.set(o.get() + n));

        handler(2);
        assert_eq!(owner.get(), 2);
        assert_eq!(Rc::strong_count(&owner), 1);

        let released = Rc::downgrade(&owner);
        drop(owner);
        assert!(released.upgrade().is_none());
        handler(5);
    }
}
