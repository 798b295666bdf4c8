use meta_sim::{
    Archetype, GamePhase, MetaSimulation, MetaSimulationConfig, StatKind, WinRateReport,
};

fn run_season(seed: u64, weeks: u32) -> (WinRateReport, Vec<(Archetype, f32, f32)>, f32) {
    let mut sim = MetaSimulation::new(MetaSimulationConfig::builtin().with_seed(seed));
    for week in 0..weeks {
        sim.advance_week();
        if week % 2 == 0 {
            sim.modify_stat(Archetype::Mage, StatKind::Damage, 5.0)
                .expect("mage exists");
        }
        for phase in GamePhase::ALL {
            sim.advance_phase(phase);
            sim.advance_time(20.0);
        }
        let open: Vec<_> = sim.active_events().iter().map(|event| event.id).collect();
        for id in open {
            let response = sim
                .active_events()
                .iter()
                .find(|event| event.id == id)
                .and_then(|event| event.definition.responses.last())
                .map(|response| response.id.clone());
            if let Some(response) = response {
                let _ = sim.resolve_event(id, &response);
            }
        }
    }
    let stats = sim
        .stat_store()
        .tables()
        .map(|(archetype, table)| {
            (
                archetype,
                table.get(StatKind::WinRate),
                table.get(StatKind::Popularity),
            )
        })
        .collect();
    (
        sim.win_rate_report().clone(),
        stats,
        sim.community_sentiment(),
    )
}

#[test]
fn same_seed_replays_identically() {
    let (report_a, stats_a, sentiment_a) = run_season(7, 8);
    let (report_b, stats_b, sentiment_b) = run_season(7, 8);

    assert_eq!(report_a.cycle, report_b.cycle);
    assert_eq!(report_a.entries, report_b.entries);
    assert_eq!(stats_a, stats_b);
    assert_eq!(sentiment_a, sentiment_b);
}

#[test]
fn win_rates_stay_in_bounds_over_a_season() {
    let (_, stats, sentiment) = run_season(99, 12);
    for (archetype, win_rate, popularity) in stats {
        assert!((0.0..=100.0).contains(&win_rate), "{archetype}: {win_rate}");
        assert!((0.0..=100.0).contains(&popularity), "{archetype}: {popularity}");
    }
    assert!((0.0..=100.0).contains(&sentiment));
}
