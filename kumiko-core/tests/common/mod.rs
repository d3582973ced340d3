use kumiko_core::{
    AggregateParams, ConnectorType, Lexicon, LexiconBuilder, Network, SectionTemplate, TemplateId,
};
use kumiko_test_support::proptest_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;

pub fn proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// One person template with two friend and three stranger connectors.
pub struct Social {
    pub lexicon: Lexicon,
    pub person: TemplateId,
    pub friend: ConnectorType,
    pub stranger: ConnectorType,
}

pub fn social() -> Social {
    let mut builder = LexiconBuilder::new();
    let friend = builder.declare_connector_type("friend");
    let stranger = builder.declare_connector_type("stranger");
    builder
        .register_pole_pair(friend, friend, true)
        .expect("friend is declared");
    builder
        .register_pole_pair(stranger, stranger, true)
        .expect("stranger is declared");
    let person = builder
        .register(SectionTemplate::new(
            "person",
            vec![friend, friend, stranger, stranger, stranger],
        ))
        .expect("connector types are declared");
    Social {
        lexicon: builder.build().expect("lexicon builds"),
        person,
        friend,
        stranger,
    }
}

/// A lexicon whose networks can never close: every placed `link` brings a
/// new unmet `out` connector.
pub fn endless_chain() -> (Lexicon, TemplateId) {
    let mut builder = LexiconBuilder::new();
    let out = builder.declare_connector_type("out");
    let inbound = builder.declare_connector_type("in");
    builder
        .register_pole_pair(out, inbound, false)
        .expect("types are declared");
    let head = builder
        .register_unweighted(SectionTemplate::new("head", vec![out]))
        .expect("types are declared");
    builder
        .register(SectionTemplate::new("link", vec![inbound, out]))
        .expect("types are declared");
    (builder.build().expect("lexicon builds"), head)
}

/// Checks the structural guarantees every returned network must satisfy.
pub fn assert_well_formed(network: &Network, lexicon: &Lexicon, params: &AggregateParams) {
    assert!(
        network.len() <= params.max_network_size(),
        "network of {} instances exceeds cap {}",
        network.len(),
        params.max_network_size()
    );
    assert!(network.is_acceptable(params.close_fraction()));
    for edge in network.edges() {
        let donor = network
            .connector_type(edge.donor)
            .expect("donor resolves");
        let acceptor = network
            .connector_type(edge.acceptor)
            .expect("acceptor resolves");
        assert!(
            lexicon.compatible(donor, acceptor),
            "edge {} -> {} joins incompatible types",
            edge.donor,
            edge.acceptor
        );
        if !params.allow_self_loops() {
            assert!(!edge.is_self_loop(), "edge {} -> {} is a self-loop", edge.donor, edge.acceptor);
        }
    }
}
