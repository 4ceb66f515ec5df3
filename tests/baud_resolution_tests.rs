use proptest::prelude::*;
use servo_serial::constants::BAUD_TOLERANCE;
use servo_serial::serial::{
    match_standard, BaudRateResolver, BaudRequest, BaudResolution, SerialAdapter, ServoFamily,
    StandardBaud,
};

#[test]
fn test_every_standard_rate_resolves_to_itself() {
    let resolver = BaudRateResolver::default();
    for id in StandardBaud::ALL {
        let res = resolver.resolve(BaudRequest::Literal(id.as_u32()));
        assert!(res.is_standard(), "{id} should be standard");
        assert_eq!(res.standard_id(), Some(id));
        assert_eq!(res.custom_rate(), None);
    }
}

#[test]
fn test_near_standard_rate_is_standard() {
    let resolver = BaudRateResolver::default();
    let res = resolver.resolve(BaudRequest::Literal(57_599));
    assert_eq!(res, BaudResolution::Standard(StandardBaud::Baud57600));
    assert_eq!(res.rate(), 57_600);
}

#[test]
fn test_far_rate_is_custom() {
    let resolver = BaudRateResolver::default();
    let res = resolver.resolve(BaudRequest::Literal(500_000));
    assert!(!res.is_standard());
    assert_eq!(res.standard_id(), None);
    assert_eq!(res.custom_rate(), Some(500_000));
}

#[test]
fn test_tolerance_edges() {
    // 1.5% of 115200 is 1728
    assert_eq!(
        match_standard(115_200 + 1_700),
        BaudResolution::Standard(StandardBaud::Baud115200)
    );
    assert_eq!(match_standard(115_200 + 1_800), BaudResolution::Custom(117_000));
    assert_eq!(match_standard(1_000_000), BaudResolution::Custom(1_000_000));
}

#[test]
fn test_index_requests_go_through_family_table() {
    let x = BaudRateResolver::new(ServoFamily::DynamixelX, SerialAdapter::Unknown);
    assert_eq!(
        x.resolve(BaudRequest::Index(1)),
        BaudResolution::Standard(StandardBaud::Baud57600)
    );
    assert_eq!(x.resolve(BaudRequest::Index(3)), BaudResolution::Custom(1_000_000));

    let xl = BaudRateResolver::new(ServoFamily::DynamixelXl320, SerialAdapter::Unknown);
    assert_eq!(
        xl.resolve(BaudRequest::Index(2)),
        BaudResolution::Standard(StandardBaud::Baud115200)
    );
}

#[test]
fn test_raw_values_follow_index_convention() {
    let ax = BaudRateResolver::new(ServoFamily::DynamixelAx, SerialAdapter::Unknown);
    // baudnum 1 on protocol v1 is 1 Mbps
    assert_eq!(ax.resolve(BaudRequest::from_raw(1)).rate(), 1_000_000);
    assert_eq!(ax.resolve(BaudRequest::from_raw(115_200)).rate(), 115_200);
}

proptest! {
    #[test]
    fn prop_match_standard_honours_tolerance(rate in 1u32..5_000_000u32) {
        let within = StandardBaud::ALL.iter().find(|id| {
            f64::from(id.as_u32().abs_diff(rate)) / f64::from(rate) <= BAUD_TOLERANCE
        });
        match (match_standard(rate), within) {
            (BaudResolution::Standard(id), Some(expected)) => prop_assert_eq!(id, *expected),
            (BaudResolution::Custom(custom), None) => prop_assert_eq!(custom, rate),
            (res, expected) => prop_assert!(false, "rate {} resolved to {:?}, expected {:?}", rate, res, expected),
        }
    }

    #[test]
    fn prop_unknown_family_keeps_requested_rate(rate in 1u32..5_000_000u32) {
        let res = BaudRateResolver::default().resolve(BaudRequest::Literal(rate));
        prop_assert_eq!(res, match_standard(rate));
    }
}
