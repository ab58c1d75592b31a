#[cfg(test)]
mod units {
    use crate::event::{Event, EventKind, EventList, EventPartner};

    fn pair(time: f64, partner: usize, counter: u64) -> Event {
        Event::new(
            time,
            EventKind::PairInteraction,
            counter,
            EventPartner::Particle(partner),
        )
    }

    #[test]
    fn never_event_is_infinite_and_none() {
        let never = Event::never();
        assert!(never.time.is_infinite());
        assert_eq!(never.kind, EventKind::None);
        assert!(never.is_never());
    }

    #[test]
    fn events_order_by_time_first() {
        let early = pair(1.0, 9, 0);
        let late = pair(2.0, 0, 0);
        assert!(early < late);
        assert!(Event::never() > late);
    }

    #[test]
    fn equal_time_ties_break_on_partner_then_counter() {
        let a = pair(1.0, 2, 0);
        let b = pair(1.0, 3, 0);
        assert!(a < b);

        let c = pair(1.0, 2, 1);
        assert!(a < c);

        // Particle partners sort before object partners
        let wall = Event::new(1.0, EventKind::LocalObject, 0, EventPartner::Object(0));
        assert!(b < wall);
    }

    #[test]
    fn nan_times_sort_after_infinity() {
        let nan = pair(f64::NAN, 0, 0);
        assert!(nan > Event::never());
    }

    #[test]
    fn empty_list_tops_with_never() {
        let pel = EventList::new();
        assert!(pel.is_empty());
        assert!(pel.top().is_never());
    }

    #[test]
    fn push_pop_returns_events_in_time_order() {
        let mut pel = EventList::new();
        for &t in &[3.0, 1.0, 2.0, 0.5, 5.0] {
            pel.push(pair(t, 0, 0));
        }
        let mut times = Vec::new();
        while let Some(event) = pel.pop() {
            times.push(event.time);
        }
        assert_eq!(times, vec![0.5, 1.0, 2.0, 3.0, 5.0]);
    }

    #[test]
    fn none_kind_descriptors_are_refused() {
        let mut pel = EventList::new();
        pel.push(Event::never());
        assert!(pel.is_empty());
        // The invariant: a non-empty list never tops with kind None
        pel.push(pair(1.0, 0, 0));
        assert_eq!(pel.top().kind, EventKind::PairInteraction);
    }

    #[test]
    fn clear_empties_the_list() {
        let mut pel = EventList::new();
        pel.push(pair(1.0, 0, 0));
        pel.push(pair(2.0, 1, 0));
        pel.clear();
        assert!(pel.is_empty());
        assert!(pel.top().is_never());
    }

    #[test]
    fn shift_times_moves_every_descriptor() {
        let mut pel = EventList::new();
        pel.push(pair(1.0, 0, 0));
        pel.push(pair(2.0, 1, 0));
        pel.shift_times(-0.5);
        assert_eq!(pel.top().time, 0.5);
        pel.pop();
        assert_eq!(pel.top().time, 1.5);
    }

    #[test]
    fn rescale_times_preserves_order() {
        let mut pel = EventList::new();
        for &t in &[4.0, 1.0, 3.0] {
            pel.push(pair(t, 0, 0));
        }
        pel.rescale_times(2.0);
        let mut times = Vec::new();
        while let Some(event) = pel.pop() {
            times.push(event.time);
        }
        assert_eq!(times, vec![2.0, 6.0, 8.0]);
    }

    #[test]
    fn growth_beyond_inline_capacity_loses_nothing() {
        let mut pel = EventList::new();
        for t in 0..50 {
            pel.push(pair(50.0 - t as f64, t, 0));
        }
        assert_eq!(pel.len(), 50);
        let mut last = f64::NEG_INFINITY;
        while let Some(event) = pel.pop() {
            assert!(event.time >= last);
            last = event.time;
        }
    }

    #[test]
    fn equal_time_pops_are_deterministic() {
        // Two lists receiving the same descriptors in different orders must
        // pop them identically
        let events = [pair(1.0, 3, 0), pair(1.0, 1, 0), pair(1.0, 2, 0)];
        let mut a = EventList::new();
        let mut b = EventList::new();
        for e in events {
            a.push(e);
        }
        for e in events.iter().rev() {
            b.push(*e);
        }
        while !a.is_empty() {
            assert_eq!(a.pop().unwrap(), b.pop().unwrap());
        }
        assert!(b.is_empty());
    }
}
