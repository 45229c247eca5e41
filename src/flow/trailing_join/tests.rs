use assert_call::{call, CallRecorder};

use super::*;
use crate::core::Runtime;

#[test]
fn publishes_when_all_sources_fired() {
    let rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let a = Action::<i32>::new("a", rt.scheduler());
    let b = Store::<&'static str>::new("b", rt.scheduler());
    let j = join_trailing2(&a, &b, rt.scheduler());
    let _s = j.listen(|(x, y)| call!("{x} {y}"));

    a.emit(1);
    cr.verify(());
    assert_eq!(j.fired(), vec![true, false]);
    b.emit("one");
    cr.verify("1 one");
    assert_eq!(j.fired(), vec![false, false]);
}

#[test]
fn trailing_payloads_are_the_latest() {
    let rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let a = Action::<i32>::new("a", rt.scheduler());
    let b = Action::<i32>::new("b", rt.scheduler());
    let j = join_trailing2(&a, &b, rt.scheduler());
    let _s = j.listen(|(x, y)| call!("{x} {y}"));

    a.emit(1);
    a.emit(2);
    a.emit(3);
    b.emit(10);
    cr.verify("3 10");
}

#[test]
fn flags_reset_after_publication() {
    let rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let a = Action::<i32>::new("a", rt.scheduler());
    let b = Action::<i32>::new("b", rt.scheduler());
    let j = join_trailing2(&a, &b, rt.scheduler());
    let _s = j.listen(|(x, y)| call!("{x} {y}"));

    a.emit(1);
    b.emit(2);
    cr.verify("1 2");
    b.emit(3);
    cr.verify(());
    a.emit(4);
    cr.verify("4 3");
}

#[test]
fn n_way_join_keeps_source_order() {
    let rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let a = Action::<i32>::new("a", rt.scheduler());
    let b = Action::<i32>::new("b", rt.scheduler());
    let c = Store::<i32>::new("c", rt.scheduler());
    let j = join_trailing([Source::from(&a), Source::from(&b), Source::from(&c)], rt.scheduler());
    let _s = j.listen(|v| call!("{v:?}"));

    c.emit(3);
    a.emit(1);
    cr.verify(());
    b.emit(2);
    cr.verify("[1, 2, 3]");
}

#[test]
fn stop_ignores_further_events() {
    let rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let a = Action::<i32>::new("a", rt.scheduler());
    let b = Action::<i32>::new("b", rt.scheduler());
    let j = join_trailing2(&a, &b, rt.scheduler());
    let _s = j.listen(|(x, y)| call!("{x} {y}"));

    a.emit(1);
    j.stop();
    assert!(!j.is_armed());
    assert_eq!(a.listener_count(), 0);
    b.emit(2);
    cr.verify(());
}

#[test]
fn rearm_starts_a_fresh_cycle() {
    let rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let a = Action::<i32>::new("a", rt.scheduler());
    let b = Action::<i32>::new("b", rt.scheduler());
    let j = join_trailing2(&a, &b, rt.scheduler());
    let _s = j.listen(|(x, y)| call!("{x} {y}"));

    a.emit(1);
    j.rearm();
    assert!(j.is_armed());
    b.emit(2);
    cr.verify(());
    a.emit(3);
    cr.verify("3 2");
}

#[test]
fn rearm_from_own_listener_drops_in_flight_event() {
    let rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let a = Action::<i32>::new("a", rt.scheduler());
    let b = Action::<i32>::new("b", rt.scheduler());
    let target = Rc::new(RefCell::new(Weak::<TrailingJoin<(i32, i32)>>::new()));
    let target0 = target.clone();
    let _rearm = b.listen(move |_| {
        if let Some(j) = target0.borrow().upgrade() {
            j.rearm();
        }
    });
    let j = Rc::new(join_trailing2(&a, &b, rt.scheduler()));
    *target.borrow_mut() = Rc::downgrade(&j);
    let _s = j.listen(|(x, y)| call!("{x} {y}"));

    a.emit(1);
    b.emit(2);
    cr.verify(());
    assert_eq!(j.fired(), vec![false, false]);
}

#[test]
fn flush_publishes_latest_without_new_source_event() {
    let rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let source = Store::<i32>::new("source", rt.scheduler());
    let flush = Action::<()>::new("flush", rt.scheduler());
    let j = join_flush(&source, &flush, rt.scheduler());
    let _s = j.listen(|x| call!("{x}"));

    source.emit(1);
    assert!(j.source_fired());
    cr.verify(());
    flush.emit(());
    cr.verify("1");
    assert!(!j.source_fired());

    flush.emit(());
    cr.verify("1");
}

#[test]
fn flush_before_source_publishes_nothing() {
    let rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let source = Action::<i32>::new("source", rt.scheduler());
    let flush = Action::<()>::new("flush", rt.scheduler());
    let j = join_flush(&source, &flush, rt.scheduler());
    let _s = j.listen(|x| call!("{x}"));

    flush.emit(());
    cr.verify(());
    assert!(j.is_armed());
    source.emit(5);
    flush.emit(());
    cr.verify("5");
}

#[test]
fn flush_rearms_and_keeps_subscription_count() {
    let rt = Runtime::new();
    let source = Action::<i32>::new("source", rt.scheduler());
    let flush = Action::<()>::new("flush", rt.scheduler());
    let j = join_flush(&source, &flush, rt.scheduler());
    source.emit(1);
    flush.emit(());
    flush.emit(());
    assert_eq!(source.listener_count(), 1);
    assert_eq!(flush.listener_count(), 1);
    j.stop();
    assert_eq!(flush.listener_count(), 0);
}

#[test]
fn flush_keeps_event_delivered_during_rearm() {
    let rt = Runtime::new();
    let mut cr = CallRecorder::new();
    let source = Store::<i32>::new("source", rt.scheduler());
    let flush = Action::<()>::new("flush", rt.scheduler());
    let target = Rc::new(RefCell::new(Weak::<FlushJoin<i32>>::new()));
    let target0 = target.clone();
    let _rearm = source.listen(move |_| {
        if let Some(j) = target0.borrow().upgrade() {
            j.rearm();
        }
    });
    let j = Rc::new(join_flush(&source, &flush, rt.scheduler()));
    *target.borrow_mut() = Rc::downgrade(&j);
    let _s = j.listen(|x| call!("{x}"));

    source.emit(1);
    assert!(!j.source_fired());
    flush.emit(());
    cr.verify("1");
}
