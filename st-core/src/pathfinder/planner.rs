use st_domain::{distance, FlightMode, Waypoint, WaypointSymbol};

/// One hop of a plan: travel to `hop` using `flight_mode`, covering `distance`
/// units (already rounded to match the fuel-cost model).
#[derive(Debug, Clone, PartialEq)]
pub struct TravelAction {
    pub hop: WaypointSymbol,
    pub flight_mode: FlightMode,
    pub distance: i64,
}

/// Greedy, fuel-bounded route planner: no A*, no global optimum, just the
/// rule this fleet actually uses — always advance toward the destination
/// using the cheapest flight mode the remaining fuel budget allows, refueling
/// only via candidate waypoints that already sell fuel.
pub struct Planner;

impl Planner {
    /// `plan(ship, src, dst)`. `fuel_capacity` is the ship's fuel tank size;
    /// `waypoints` is every waypoint known in the system, used to build the
    /// candidate node set (`{src, dst} ∪ known fuel-selling waypoints`).
    pub fn plan(fuel_capacity: i64, src: &Waypoint, dst: &Waypoint, waypoints: &[Waypoint]) -> Vec<TravelAction> {
        let fuel_cap = fuel_capacity - 1;
        let burn_cap = fuel_cap / 2 - 1;

        if fuel_cap < 1 {
            // zero/near-zero fuel capacity: a satellite. Single BURN hop or bust.
            let d = distance((src.x, src.y), (dst.x, dst.y)).round() as i64;
            return vec![TravelAction {
                hop: dst.symbol.clone(),
                flight_mode: FlightMode::Burn,
                distance: d,
            }];
        }

        let mut candidates: Vec<&Waypoint> = waypoints
            .iter()
            .filter(|w| w.symbol != src.symbol && w.symbol != dst.symbol && w.is_fuel_station())
            .collect();
        candidates.push(src);
        candidates.push(dst);

        let mut plan = Vec::new();
        let mut cur = src.clone();
        let mut pool: Vec<Waypoint> = candidates.iter().map(|w| (*w).clone()).collect();

        loop {
            let d_to_dst = distance((cur.x, cur.y), (dst.x, dst.y));
            let rounded = d_to_dst.round() as i64;

            if rounded <= fuel_cap {
                let mode = if rounded <= burn_cap && dst.is_fuel_station() {
                    FlightMode::Burn
                } else {
                    FlightMode::Cruise
                };
                plan.push(TravelAction {
                    hop: dst.symbol.clone(),
                    flight_mode: mode,
                    distance: rounded,
                });
                return plan;
            }

            let reachable: Vec<&Waypoint> = pool
                .iter()
                .filter(|n| n.symbol != cur.symbol)
                .filter(|n| {
                    let d = distance((cur.x, cur.y), (n.x, n.y)).round() as i64;
                    FlightMode::Cruise.fuel_cost(d) < fuel_cap
                })
                .collect();

            if reachable.is_empty() {
                return Vec::new();
            }

            let next = reachable
                .into_iter()
                .min_by(|a, b| {
                    let da = distance((a.x, a.y), (dst.x, dst.y));
                    let db = distance((b.x, b.y), (dst.x, dst.y));
                    da.partial_cmp(&db).unwrap()
                })
                .unwrap()
                .clone();

            let d_next_to_dst = distance((next.x, next.y), (dst.x, dst.y));
            if d_next_to_dst >= d_to_dst {
                return Vec::new();
            }

            let hop_distance = distance((cur.x, cur.y), (next.x, next.y)).round() as i64;
            let mode = if hop_distance <= burn_cap && next.is_fuel_station() {
                FlightMode::Burn
            } else {
                FlightMode::Cruise
            };
            plan.push(TravelAction {
                hop: next.symbol.clone(),
                flight_mode: mode,
                distance: hop_distance,
            });

            pool.retain(|w| w.symbol != cur.symbol);
            cur = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use st_domain::{SystemSymbol, WaypointType};

    fn wp(symbol: &str, x: i64, y: i64, fuel_station: bool) -> Waypoint {
        Waypoint {
            symbol: WaypointSymbol::new(symbol),
            r#type: WaypointType::Planet,
            system_symbol: SystemSymbol("X1-TEST".into()),
            x,
            y,
            traits: if fuel_station {
                vec![st_domain::WaypointTrait {
                    symbol: st_domain::WaypointTraitSymbol::FuelStation,
                    name: "Fuel Station".into(),
                    description: String::new(),
                }]
            } else {
                vec![]
            },
            is_under_construction: false,
        }
    }

    #[test]
    fn a_direct_hop_within_fuel_capacity_is_a_single_cruise_action() {
        let src = wp("X1-TEST-A", 0, 0, false);
        let dst = wp("X1-TEST-B", 10, 0, false);
        let plan = Planner::plan(400, &src, &dst, &[src.clone(), dst.clone()]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].hop, dst.symbol);
        assert_eq!(plan[0].flight_mode, FlightMode::Cruise);
    }

    #[test]
    fn a_hop_beyond_fuel_capacity_routes_through_a_known_fuel_stop() {
        let src = wp("X1-TEST-A", 0, 0, false);
        let waypost = wp("X1-TEST-MID", 50, 0, true);
        let dst = wp("X1-TEST-B", 100, 0, false);
        // fuel capacity small enough that a/b is unreachable directly
        let plan = Planner::plan(60, &src, &dst, &[src.clone(), waypost.clone(), dst.clone()]);
        assert!(!plan.is_empty());
        assert_eq!(plan.first().unwrap().hop, waypost.symbol);
    }

    #[test]
    fn no_progress_candidates_fail_the_plan() {
        let src = wp("X1-TEST-A", 0, 0, false);
        let dst = wp("X1-TEST-B", 1000, 0, false);
        let plan = Planner::plan(10, &src, &dst, &[src.clone(), dst.clone()]);
        assert!(plan.is_empty());
    }

    #[test]
    fn zero_fuel_capacity_ships_get_a_single_burn_hop() {
        let src = wp("X1-TEST-A", 0, 0, false);
        let dst = wp("X1-TEST-B", 10, 0, false);
        let plan = Planner::plan(1, &src, &dst, &[]);
        assert_eq!(plan, vec![TravelAction { hop: dst.symbol, flight_mode: FlightMode::Burn, distance: 10 }]);
    }
}
