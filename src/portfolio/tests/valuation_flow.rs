mod common;
use common::{address, property_valued_at, setup_db, user};

use diesel::prelude::*;
use portfolio::PortfolioError;
use portfolio::maintenance::{self, MaintenanceFilter, MaintenanceInput};
use portfolio::money::{MAX_AMOUNT, units};
use portfolio::property::{self, PropertyInput, ValuationInput};
use portfolio::schema::{maintenance_records, valuations};
use portfolio::types::{Role, ValuationMethod};

fn work(property_id: i32, category: &str, cost: i64) -> MaintenanceInput {
    MaintenanceInput {
        property_id: Some(property_id),
        title: Some(format!("{category} work")),
        category: Some(category.into()),
        cost_cents: Some(cost),
        ..Default::default()
    }
}

fn valuation_count(conn: &mut SqliteConnection, property_id: i32) -> i64 {
    valuations::table
        .filter(valuations::property_id.eq(property_id))
        .count()
        .get_result(conn)
        .unwrap()
}

#[test]
fn structural_work_raises_value_by_impact() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(500_000));

    let out = maintenance::create(&mut conn, &owner, &work(prop.id, "structural", units(2000))).unwrap();

    let v = out.valuation.expect("adjustment applied");
    assert_eq!(v.value_cents, units(502_200));
    assert_eq!(v.method, ValuationMethod::Automated.as_str());
    assert!(v.notes.unwrap().contains("500000.00 -> 502200.00"));

    let after = property::get(&mut conn, &owner, prop.id).unwrap();
    assert_eq!(after.current_value_cents, Some(units(502_200)));
    assert_eq!(after.last_valuation_date.as_deref(), Some(v.valued_at.as_str()));
}

#[test]
fn cheap_work_leaves_value_alone() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(500_000));

    let out = maintenance::create(&mut conn, &owner, &work(prop.id, "structural", units(500))).unwrap();
    assert!(out.valuation.is_none());

    // exactly at the threshold does not count either
    let out = maintenance::create(&mut conn, &owner, &work(prop.id, "renovation", units(1000))).unwrap();
    assert!(out.valuation.is_none());

    assert_eq!(valuation_count(&mut conn, prop.id), 1);
    let after = property::get(&mut conn, &owner, prop.id).unwrap();
    assert_eq!(after.current_value_cents, Some(units(500_000)));
}

#[test]
fn editing_cost_applies_the_difference() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(500_000));

    let created = maintenance::create(&mut conn, &owner, &work(prop.id, "plumbing", units(2000))).unwrap();
    let before = created.valuation.unwrap().value_cents;
    assert_eq!(before, units(501_600));

    let edit = MaintenanceInput {
        cost_cents: Some(units(2500)),
        ..Default::default()
    };
    let out = maintenance::update(&mut conn, &owner, created.record.id, &edit).unwrap();
    assert_eq!(out.record.cost_cents, units(2500));
    assert_eq!(out.valuation.unwrap().value_cents, before + units(400));

    // a 50.00 change in impact is not material
    let edit = MaintenanceInput {
        cost_cents: Some(units(2562) + 50),
        ..Default::default()
    };
    let out = maintenance::update(&mut conn, &owner, created.record.id, &edit).unwrap();
    assert!(out.valuation.is_none());
    let after = property::get(&mut conn, &owner, prop.id).unwrap();
    assert_eq!(after.current_value_cents, Some(before + units(400)));
}

#[test]
fn lowering_cost_lowers_value() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(300_000));

    let created = maintenance::create(&mut conn, &owner, &work(prop.id, "renovation", units(10_000))).unwrap();
    assert_eq!(created.valuation.unwrap().value_cents, units(312_000));

    let edit = MaintenanceInput {
        category: Some("cosmetic".into()),
        ..Default::default()
    };
    let out = maintenance::update(&mut conn, &owner, created.record.id, &edit).unwrap();
    assert_eq!(out.valuation.unwrap().value_cents, units(305_000));
}

#[test]
fn purchase_price_is_the_fallback_baseline() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property::create(
        &mut conn,
        &owner,
        &PropertyInput {
            purchase_price_cents: Some(units(200_000)),
            purchase_date: Some("2020-06-01".into()),
            ..address()
        },
    )
    .unwrap();
    assert_eq!(prop.current_value_cents, Some(units(200_000)));
    assert_eq!(prop.last_valuation_date.as_deref(), Some("2020-06-01T00:00:00.000Z"));

    let out = maintenance::create(&mut conn, &owner, &work(prop.id, "landscaping", units(5000))).unwrap();
    assert_eq!(out.valuation.unwrap().value_cents, units(201_500));
}

#[test]
fn no_baseline_skips_adjustment() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property::create(&mut conn, &owner, &address()).unwrap();
    assert_eq!(prop.current_value_cents, None);

    let out = maintenance::create(&mut conn, &owner, &work(prop.id, "structural", units(9000))).unwrap();
    assert!(out.valuation.is_none());
    assert_eq!(valuation_count(&mut conn, prop.id), 0);
}

#[test]
fn latest_valuation_wins_even_when_backdated_ones_arrive() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(400_000));

    property::add_valuation(
        &mut conn,
        &owner,
        prop.id,
        &ValuationInput {
            value_cents: units(350_000),
            method: ValuationMethod::Professional,
            notes: Some("2019 appraisal".into()),
            valued_at: Some("2019-01-01T00:00:00Z".into()),
        },
    )
    .unwrap();

    let after = property::get(&mut conn, &owner, prop.id).unwrap();
    assert_eq!(after.current_value_cents, Some(units(400_000)));

    let history = property::valuations(&mut conn, &owner, prop.id).unwrap();
    let values: Vec<i64> = history.iter().map(|v| v.value_cents).collect();
    assert_eq!(values, vec![units(400_000), units(350_000)]);
}

#[test]
fn automated_and_future_valuations_are_rejected() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(400_000));

    let err = property::add_valuation(
        &mut conn,
        &owner,
        prop.id,
        &ValuationInput {
            value_cents: units(1),
            method: ValuationMethod::Automated,
            notes: None,
            valued_at: Some("2999-01-01T00:00:00Z".into()),
        },
    )
    .unwrap_err();
    let PortfolioError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(names, vec!["method", "valued_at"]);
}

#[test]
fn owner_estimate_on_update_appends_valuation() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(400_000));

    let updated = property::update(
        &mut conn,
        &owner,
        prop.id,
        &PropertyInput {
            current_value_cents: Some(units(410_000)),
            bedrooms: Some(4),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.current_value_cents, Some(units(410_000)));
    assert_eq!(updated.bedrooms, Some(4));
    assert_eq!(valuation_count(&mut conn, prop.id), 2);

    // unchanged value: no new row
    property::update(
        &mut conn,
        &owner,
        prop.id,
        &PropertyInput {
            current_value_cents: Some(units(410_000)),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(valuation_count(&mut conn, prop.id), 2);
}

#[test]
fn access_rules() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let other = user(&mut conn, "ivan@example.com", Role::Investor);
    let trade = user(&mut conn, "tom@example.com", Role::Tradesperson);
    let admin = user(&mut conn, "ada@example.com", Role::Admin);
    let prop = property_valued_at(&mut conn, &owner, units(500_000));

    assert!(matches!(
        property::get(&mut conn, &other, prop.id),
        Err(PortfolioError::Unauthorized)
    ));
    assert!(matches!(
        property::get(&mut conn, &owner, 9999),
        Err(PortfolioError::NotFound { .. })
    ));
    assert!(property::get(&mut conn, &admin, prop.id).is_ok());

    assert!(matches!(
        maintenance::create(&mut conn, &other, &work(prop.id, "other", units(10))),
        Err(PortfolioError::Unauthorized)
    ));
    let by_trade = maintenance::create(&mut conn, &trade, &work(prop.id, "plumbing", units(50))).unwrap();
    let by_owner = maintenance::create(&mut conn, &owner, &work(prop.id, "cosmetic", units(50))).unwrap();

    // tradesperson sees their own record only; owner sees both
    let seen = maintenance::list(&mut conn, &trade, MaintenanceFilter::default()).unwrap();
    assert_eq!(seen.iter().map(|r| r.id).collect::<Vec<_>>(), vec![by_trade.record.id]);
    let seen = maintenance::list(&mut conn, &owner, MaintenanceFilter { property_id: Some(prop.id) }).unwrap();
    assert_eq!(seen.len(), 2);

    assert!(matches!(
        maintenance::delete(&mut conn, &trade, by_owner.record.id),
        Err(PortfolioError::Unauthorized)
    ));
    maintenance::delete(&mut conn, &trade, by_trade.record.id).unwrap();
    maintenance::delete(&mut conn, &admin, by_owner.record.id).unwrap();

    assert!(matches!(
        maintenance::list(&mut conn, &owner, MaintenanceFilter { property_id: Some(4242) }),
        Err(PortfolioError::NotFound { .. })
    ));
}

#[test]
fn filtering_on_someone_elses_property_is_unauthorized() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let other = user(&mut conn, "ivan@example.com", Role::Investor);
    let trade = user(&mut conn, "tom@example.com", Role::Tradesperson);
    let prop = property_valued_at(&mut conn, &owner, units(500_000));
    maintenance::create(&mut conn, &owner, &work(prop.id, "cosmetic", units(50))).unwrap();

    let mine = MaintenanceFilter { property_id: Some(prop.id) };
    assert!(matches!(
        maintenance::list(&mut conn, &other, mine),
        Err(PortfolioError::Unauthorized)
    ));
    // tradespeople may work on any property, so the filter only narrows their own records
    assert!(maintenance::list(&mut conn, &trade, mine).unwrap().is_empty());
}

#[test]
fn deleting_property_cascades() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(500_000));
    maintenance::create(&mut conn, &owner, &work(prop.id, "structural", units(2000))).unwrap();

    property::delete(&mut conn, &owner, prop.id).unwrap();

    let records: i64 = maintenance_records::table.count().get_result(&mut conn).unwrap();
    assert_eq!(records, 0);
    assert_eq!(valuation_count(&mut conn, prop.id), 0);
    common::fk_check_empty(&mut conn);
}

#[test]
fn deleting_record_keeps_its_valuation() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(500_000));
    let out = maintenance::create(&mut conn, &owner, &work(prop.id, "structural", units(2000))).unwrap();

    maintenance::delete(&mut conn, &owner, out.record.id).unwrap();
    assert_eq!(valuation_count(&mut conn, prop.id), 2);
    let after = property::get(&mut conn, &owner, prop.id).unwrap();
    assert_eq!(after.current_value_cents, Some(units(502_200)));
}

#[test]
fn out_of_range_costs_are_rejected_without_touching_value() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(500_000));

    let err = maintenance::create(&mut conn, &owner, &work(prop.id, "structural", i64::MAX)).unwrap_err();
    let PortfolioError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    assert_eq!(fields[0].field, "cost_cents");

    let created = maintenance::create(&mut conn, &owner, &work(prop.id, "structural", units(2000))).unwrap();
    let edit = MaintenanceInput {
        cost_cents: Some(MAX_AMOUNT + 1),
        ..Default::default()
    };
    assert!(matches!(
        maintenance::update(&mut conn, &owner, created.record.id, &edit),
        Err(PortfolioError::Validation(_))
    ));

    assert_eq!(valuation_count(&mut conn, prop.id), 2);
    let after = property::get(&mut conn, &owner, prop.id).unwrap();
    assert_eq!(after.current_value_cents, Some(units(502_200)));
}

#[test]
fn out_of_range_values_are_rejected() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);

    let err = property::create(
        &mut conn,
        &owner,
        &PropertyInput {
            current_value_cents: Some(i64::MAX),
            purchase_price_cents: Some(MAX_AMOUNT + 1),
            ..address()
        },
    )
    .unwrap_err();
    let PortfolioError::Validation(fields) = err else {
        panic!("expected validation error");
    };
    let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
    assert_eq!(names, vec!["purchase_price_cents", "current_value_cents"]);

    let prop = property_valued_at(&mut conn, &owner, MAX_AMOUNT);
    assert!(matches!(
        property::add_valuation(
            &mut conn,
            &owner,
            prop.id,
            &ValuationInput {
                value_cents: i64::MAX,
                method: ValuationMethod::Manual,
                notes: None,
                valued_at: None,
            },
        ),
        Err(PortfolioError::Validation(_))
    ));
}

#[test]
fn downward_adjustment_stops_at_zero() {
    let (_db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(1_000));

    let created = maintenance::create(&mut conn, &owner, &work(prop.id, "renovation", units(10_000))).unwrap();
    assert_eq!(created.valuation.unwrap().value_cents, units(13_000));

    property::add_valuation(
        &mut conn,
        &owner,
        prop.id,
        &ValuationInput {
            value_cents: units(100),
            method: ValuationMethod::Manual,
            notes: Some("storm damage".into()),
            valued_at: None,
        },
    )
    .unwrap();

    // 12000.00 -> 3000.00 impact, on a 100.00 baseline
    let edit = MaintenanceInput {
        category: Some("landscaping".into()),
        ..Default::default()
    };
    let out = maintenance::update(&mut conn, &owner, created.record.id, &edit).unwrap();
    assert_eq!(out.valuation.unwrap().value_cents, 0);
    let after = property::get(&mut conn, &owner, prop.id).unwrap();
    assert_eq!(after.current_value_cents, Some(0));
}

#[test]
fn concurrent_writers_do_not_lose_adjustments() {
    let (db, mut conn) = setup_db();
    let owner = user(&mut conn, "olive@example.com", Role::Owner);
    let prop = property_valued_at(&mut conn, &owner, units(100_000));

    const PER_THREAD: usize = 5;
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = db.path.clone();
            std::thread::spawn(move || {
                let mut conn = portfolio::db::connection::connect_sqlite(&path).unwrap();
                for _ in 0..PER_THREAD {
                    maintenance::create(&mut conn, &owner, &work(prop.id, "structural", units(2000))).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let after = property::get(&mut conn, &owner, prop.id).unwrap();
    assert_eq!(after.current_value_cents, Some(units(100_000) + 10 * units(2200)));
    assert_eq!(valuation_count(&mut conn, prop.id), 11);
}
