use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fiberweave::*;

#[test]
fn counter_through_two_contexts() {
    let counter = Rc::new(Cell::new(0));

    let ctx_2 = {
        let counter = counter.clone();
        create(move || {
            counter.set(counter.get() + 1);
            switch(MAIN).unwrap();
        })
        .unwrap()
    };
    let ctx_1 = {
        let counter = counter.clone();
        create(move || {
            counter.set(counter.get() + 1);
            switch(ctx_2).unwrap();
        })
        .unwrap()
    };

    switch(ctx_1).unwrap();
    assert_eq!(counter.get(), 2);
    assert_eq!(state(ctx_1), State::Suspended);
    assert_eq!(state(ctx_2), State::Suspended);
    assert_eq!(state(MAIN), State::Active);

    destroy(ctx_1).unwrap();
    destroy(ctx_2).unwrap();
}

#[test]
fn switch_to_self_is_a_no_op() {
    switch(MAIN).unwrap();
    assert_eq!(current(), MAIN);
    assert_eq!(state(MAIN), State::Active);

    let observed = Rc::new(RefCell::new(Vec::new()));
    let id = {
        let observed = observed.clone();
        create(move || {
            let me = current();
            let local = String::from("still here");
            switch(me).unwrap();
            switch(me).unwrap();
            observed.borrow_mut().push(local.clone());
            observed.borrow_mut().push(format!("{}", current() == me));
            switch(MAIN).unwrap();
        })
        .unwrap()
    };
    switch(id).unwrap();
    assert_eq!(*observed.borrow(), vec!["still here", "true"]);
    destroy(id).unwrap();
}

#[test]
fn main_is_the_same_everywhere() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let inner = {
        let seen = seen.clone();
        create(move || {
            seen.borrow_mut().push(MAIN);
            seen.borrow_mut().push(ContextId::MAIN);
            switch(MAIN).unwrap();
        })
        .unwrap()
    };
    let outer = {
        let seen = seen.clone();
        create(move || {
            seen.borrow_mut().push(MAIN);
            switch(inner).unwrap();
        })
        .unwrap()
    };
    switch(outer).unwrap();
    assert!(seen.borrow().iter().all(|id| *id == MAIN));
    assert_eq!(seen.borrow().len(), 3);

    let from_thread = std::thread::spawn(|| MAIN).join().unwrap();
    assert_eq!(from_thread, MAIN);
    assert!(MAIN.is_main());
    assert_eq!(MAIN.to_string(), "main");

    destroy(outer).unwrap();
    destroy(inner).unwrap();
}

#[test]
fn ping_pong_1000_round_trips() {
    let received = Rc::new(Cell::new(0u64));
    let ping = {
        let received = received.clone();
        create(move || {
            let mut own = 0u64;
            let text = String::from("ping");
            loop {
                own += 1;
                received.set(received.get() + 1);
                assert_eq!(text, "ping");
                assert_eq!(own, received.get());
                switch(MAIN).unwrap();
            }
        })
        .unwrap()
    };

    let mut local = 0u64;
    for i in 1..=1000 {
        local += 1;
        switch(ping).unwrap();
        assert_eq!(received.get(), i);
        assert_eq!(local, i);
    }
    destroy(ping).unwrap();
}

#[test]
fn contexts_ping_pong_between_each_other() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let peer = Rc::new(Cell::new(MAIN));

    let ping = {
        let log = log.clone();
        let peer = peer.clone();
        create(move || {
            for i in 0..1000i64 {
                log.borrow_mut().push(i);
                switch(peer.get()).unwrap();
            }
        })
        .unwrap()
    };
    let pong = {
        let log = log.clone();
        create(move || {
            for i in 0..1000i64 {
                log.borrow_mut().push(-i);
                if i < 999 {
                    switch(ping).unwrap();
                }
            }
            switch(MAIN).unwrap();
        })
        .unwrap()
    };
    peer.set(pong);

    switch(ping).unwrap();
    let log = log.borrow();
    assert_eq!(log.len(), 2000);
    for (n, entry) in log.iter().enumerate() {
        let i = (n / 2) as i64;
        if n % 2 == 0 {
            assert_eq!(*entry, i);
        } else {
            assert_eq!(*entry, -i);
        }
    }
    assert_eq!(state(ping), State::Suspended);
    assert_eq!(state(pong), State::Suspended);
    destroy(ping).unwrap();
    destroy(pong).unwrap();
}

fn countdown(n: u32, trail: &RefCell<Vec<u32>>) -> u32 {
    if n == 0 {
        switch(MAIN).unwrap();
        trail.borrow_mut().push(0);
        return 0;
    }
    let here = n * 10;
    let below = countdown(n - 1, trail);
    trail.borrow_mut().push(n);
    assert_eq!(here, n * 10);
    below + n
}

#[test]
fn resume_at_depth() {
    let trail = Rc::new(RefCell::new(Vec::new()));
    let result = Rc::new(Cell::new(None));
    let id = {
        let trail = trail.clone();
        let result = result.clone();
        create(move || {
            result.set(Some(countdown(5, &trail)));
            switch(MAIN).unwrap();
        })
        .unwrap()
    };

    switch(id).unwrap();
    assert!(trail.borrow().is_empty());
    assert_eq!(result.get(), None);

    switch(id).unwrap();
    assert_eq!(*trail.borrow(), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(result.get(), Some(15));
    destroy(id).unwrap();
}

fn is_even(n: u32, switches: &Cell<u32>) -> bool {
    if n % 7 == 0 {
        switches.set(switches.get() + 1);
        switch(MAIN).unwrap();
    }
    if n == 0 {
        true
    } else {
        is_odd(n - 1, switches)
    }
}

fn is_odd(n: u32, switches: &Cell<u32>) -> bool {
    if n == 0 {
        false
    } else {
        is_even(n - 1, switches)
    }
}

#[test]
fn resume_inside_mutual_recursion() {
    let answer = Rc::new(Cell::new(None));
    let switches = Rc::new(Cell::new(0));
    let id = {
        let answer = answer.clone();
        let switches = switches.clone();
        create(move || {
            answer.set(Some(is_even(100, &switches)));
            switch(MAIN).unwrap();
        })
        .unwrap()
    };

    let mut resumed = 0;
    while answer.get().is_none() {
        switch(id).unwrap();
        resumed += 1;
    }
    assert_eq!(answer.get(), Some(true));
    assert_eq!(switches.get() + 1, resumed);
    destroy(id).unwrap();
}

#[test]
fn deep_recursion_on_a_context_stack() {
    fn rec(n: u64) -> u64 {
        let x = std::hint::black_box([1u8; 512]);
        if n == 0 {
            switch(MAIN).unwrap();
            x[0] as u64
        } else {
            rec(n - 1) + x[(n % 512) as usize] as u64
        }
    }

    let total = Rc::new(Cell::new(0));
    let id = {
        let total = total.clone();
        Builder::new()
            .stack_size(8 * 1024 * 1024)
            .spawn(move || {
                total.set(rec(3_000));
                switch(MAIN).unwrap();
            })
            .unwrap()
    };
    switch(id).unwrap();
    assert_eq!(total.get(), 0);
    switch(id).unwrap();
    assert_eq!(total.get(), 3_001);
    destroy(id).unwrap();
}

#[test]
fn created_context_does_not_run() {
    let ran = Rc::new(Cell::new(false));
    let id = {
        let ran = ran.clone();
        create(move || ran.set(true)).unwrap()
    };
    assert!(!ran.get());
    assert_eq!(state(id), State::Unstarted);
    destroy(id).unwrap();
    assert!(!ran.get());
}

#[test]
fn states_follow_the_lifecycle() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let id = {
        let seen = seen.clone();
        create(move || {
            seen.borrow_mut().push((state(current()), state(MAIN)));
            switch(MAIN).unwrap();
        })
        .unwrap()
    };
    assert_eq!(state(id), State::Unstarted);
    switch(id).unwrap();
    assert_eq!(*seen.borrow(), vec![(State::Active, State::Suspended)]);
    assert_eq!(state(id), State::Suspended);
    destroy(id).unwrap();
    assert_eq!(state(id), State::Destroyed);
}

#[test]
fn returning_entrypoint_reports_to_main() {
    let id = create(|| {}).unwrap();
    match switch(id) {
        Err(Error::EntrypointReturned(returned)) => assert_eq!(returned, id),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(state(id), State::Terminated);
    assert_eq!(current(), MAIN);
    assert!(matches!(switch(id), Err(Error::InvalidTarget(_))));
    destroy(id).unwrap();
    assert_eq!(state(id), State::Destroyed);
}

#[test]
fn returning_entrypoint_reports_to_main_not_resumer() {
    let inner = create(|| {}).unwrap();
    let outer_result = Rc::new(RefCell::new(None));
    let outer = {
        let outer_result = outer_result.clone();
        create(move || {
            *outer_result.borrow_mut() = Some(format!("{:?}", switch(inner)));
            switch(MAIN).unwrap();
        })
        .unwrap()
    };
    assert!(matches!(switch(outer), Err(Error::EntrypointReturned(id)) if id == inner));
    assert!(outer_result.borrow().is_none());
    assert_eq!(state(outer), State::Suspended);

    // The outer context is still waiting inside its switch call.
    switch(outer).unwrap();
    assert_eq!(outer_result.borrow().as_deref(), Some("Ok(())"));
    destroy(outer).unwrap();
    destroy(inner).unwrap();
}

#[test]
fn every_thread_has_its_own_registry() {
    let id = create(|| switch(MAIN).unwrap()).unwrap();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(move || {
                assert_eq!(current(), MAIN);
                assert_eq!(state(id), State::Destroyed);
                assert!(matches!(switch(id), Err(Error::InvalidTarget(_))));
                assert!(destroy(id).is_ok());

                let counter = Rc::new(Cell::new(0));
                let local = {
                    let counter = counter.clone();
                    create(move || loop {
                        counter.set(counter.get() + 1);
                        switch(MAIN).unwrap();
                    })
                    .unwrap()
                };
                for _ in 0..100 {
                    switch(local).unwrap();
                }
                destroy(local).unwrap();
                counter.get()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 100);
    }
    assert_eq!(state(id), State::Unstarted);
    destroy(id).unwrap();
}

#[test]
fn ids_are_never_reused() {
    let mut seen = std::collections::HashSet::new();
    for _ in 0..100 {
        let id = create(|| {}).unwrap();
        assert!(!id.is_main());
        assert_eq!(ContextId::from_u64(id.as_u64()), id);
        assert_eq!(id.to_string(), id.as_u64().to_string());
        assert!(seen.insert(id));
        destroy(id).unwrap();
    }
}

#[test]
fn builder_names_contexts() {
    let id = Builder::new()
        .name("worker")
        .spawn(|| switch(MAIN).unwrap())
        .unwrap();
    assert_eq!(name(id).as_deref(), Some("worker"));
    assert_eq!(name(MAIN).as_deref(), Some("main"));

    let unnamed = create(|| {}).unwrap();
    assert_eq!(name(unnamed), None);

    destroy(id).unwrap();
    destroy(unnamed).unwrap();
    assert_eq!(name(id), None);
}

#[test]
fn tiny_stack_requests_are_raised() {
    let ran = Rc::new(Cell::new(false));
    let id = {
        let ran = ran.clone();
        Builder::new()
            .stack_size(1)
            .spawn(move || {
                ran.set(true);
                switch(MAIN).unwrap();
            })
            .unwrap()
    };
    switch(id).unwrap();
    assert!(ran.get());
    destroy(id).unwrap();
}
