use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use pob_core::parse::{FULL_ASCENDANCY_POINTS, parse_bool_or};
use pob_core::{
    GemCatalog, GemInfo, GemKind, ParseError, PassiveNode, SocketColor, parse_build,
};
use std::collections::{BTreeSet, HashMap};

fn parse(xml: &str) -> pob_core::Build {
    parse_build(xml, &GemCatalog::new()).expect("parse build")
}

const TWO_GROUPS: &str = r#"<PathOfBuilding>
    <Skills>
        <Skill slot="Body Armour" enabled="true" mainActiveSkill="1">
            <Gem nameSpec="Cyclone" level="20" quality="20"/>
            <Gem nameSpec="Melee Physical Damage Support" level="20"/>
            <Gem nameSpec="Fortify Support" level="20"/>
        </Skill>
        <Skill slot="Gloves" enabled="false" mainActiveSkill="1">
            <Gem nameSpec="Blood Rage" level="15"/>
            <Gem nameSpec="Cast when Damage Taken Support" level="1"/>
        </Skill>
    </Skills>
</PathOfBuilding>"#;

#[test]
fn skill_set_counts_all_groups_and_filters_disabled() {
    let build = parse(TWO_GROUPS);
    assert_eq!(build.skill_sets.len(), 1);

    let set = build.active_skill_set().expect("skill set");
    assert_eq!(set.title, "Default");
    assert_eq!(set.groups.len(), 2);
    assert_eq!(set.total_gems(), 5);
    assert_eq!(set.active_gems(), 2);
    assert_eq!(set.support_gems(), 3);

    let enabled: Vec<&str> = set.enabled_link_groups().map(|g| g.name.as_str()).collect();
    assert_eq!(enabled, vec!["Body Armour"]);
}

#[test]
fn gems_keep_declared_order_and_main_active_flag() {
    let build = parse(TWO_GROUPS);
    let group = &build.skill_sets[0].groups[0];

    let names: Vec<&str> = group.gems.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Cyclone", "Melee Physical Damage Support", "Fortify Support"]
    );
    let positions: Vec<usize> = group.gems.iter().map(|g| g.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
    assert!(group.gems.iter().all(|g| g.group == "Body Armour"));

    let main = group.main_active_gem().expect("main gem");
    assert_eq!(main.name, "Cyclone");
    assert_eq!(main.level, 20);
    assert_eq!(main.quality, 20);
    assert_eq!(group.gems.iter().filter(|g| g.is_main_active).count(), 1);
}

#[test]
fn anomalous_support_falls_back_to_heuristic() {
    let build = parse(
        r#"<PathOfBuilding><Skills><Skill slot="Weapon 1">
            <Gem nameSpec="Elemental Hit Support (Anomalous)" level="20" quality="23"/>
        </Skill></Skills></PathOfBuilding>"#,
    );
    let gem = &build.skill_sets[0].groups[0].gems[0];

    assert_eq!(gem.name, "Elemental Hit Support");
    assert_eq!(gem.kind, GemKind::Support);
    assert_eq!(gem.acquisition, "Drop only");
    assert_eq!(gem.color, SocketColor::White);
}

#[test]
fn gems_are_enriched_from_reference_data() {
    let catalog: GemCatalog = [GemInfo {
        name: "Minion Damage Support".into(),
        color: SocketColor::Blue,
        is_support: true,
        icon: None,
        sources: Vec::new(),
    }]
    .into_iter()
    .collect();

    let build = parse_build(
        r#"<PathOfBuilding><Skills><Skill>
            <Gem nameSpec="Minion Damage" skillId="SupportMinionDamage" level="20"/>
        </Skill></Skills></PathOfBuilding>"#,
        &catalog,
    )
    .expect("parse build");
    let gem = &build.skill_sets[0].groups[0].gems[0];

    assert_eq!(gem.name, "Minion Damage Support");
    assert_eq!(gem.skill_id.as_deref(), Some("SupportMinionDamage"));
    assert_eq!(gem.kind, GemKind::Support);
    assert_eq!(gem.color, SocketColor::Blue);
    assert_eq!(build.skill_sets[0].groups[0].name, "Group 1");
}

#[test]
fn nameless_gems_are_skipped() {
    let build = parse(
        r#"<PathOfBuilding><Skills><Skill mainActiveSkill="2">
            <Gem level="20"/>
            <Gem nameSpec="   " name=""/>
            <Gem nameSpec="(Anomalous)"/>
            <Gem name="Frostbolt" level="nope" quality=""/>
            <Gem nameSpec="Spell Echo Support"/>
        </Skill></Skills></PathOfBuilding>"#,
    );
    let group = &build.skill_sets[0].groups[0];

    assert_eq!(group.gems.len(), 2);
    assert_eq!(group.gems[0].name, "Frostbolt");
    assert_eq!(group.gems[0].position, 1);
    assert_eq!(group.gems[0].level, 1);
    assert_eq!(group.gems[0].quality, 0);
    assert_eq!(group.gems[1].position, 2);
    assert!(group.gems[1].is_main_active);
}

#[test]
fn enabled_flags_are_tri_state() {
    for (value, expected) in [
        ("true", true),
        ("TRUE", true),
        ("1", true),
        ("Yes", true),
        ("false", false),
        ("0", false),
        ("NO", false),
    ] {
        assert_eq!(parse_bool_or(Some(value), !expected), expected, "{value}");
    }
    assert!(parse_bool_or(Some("maybe"), true));
    assert!(!parse_bool_or(Some("maybe"), false));
    assert!(parse_bool_or(None, true));
}

#[test]
fn multiple_skill_sets_and_active_selection() {
    let build = parse(
        r#"<PathOfBuilding><Skills activeSkillSet="2">
            <SkillSet id="1" title="Leveling"><Skill><Gem nameSpec="Freezing Pulse"/></Skill></SkillSet>
            <SkillSet id="2"><Skill><Gem nameSpec="Arc"/></Skill></SkillSet>
        </Skills></PathOfBuilding>"#,
    );
    assert_eq!(build.skill_sets.len(), 2);
    assert_eq!(build.skill_sets[0].title, "Leveling");
    assert_eq!(build.skill_sets[1].title, "Skill set 2");
    assert_eq!(build.active_skill_set_index(), 1);
    assert_eq!(build.active_skill_set().map(|s| s.title.as_str()), Some("Skill set 2"));
}

#[test]
fn active_indexes_are_clamped() {
    let mut build = parse(
        r#"<PathOfBuilding><Skills activeSkillSet="9">
            <SkillSet title="A"/><SkillSet title="B"/>
        </Skills></PathOfBuilding>"#,
    );
    assert_eq!(build.active_skill_set_index(), 1);

    build.set_active_skill_set(0);
    assert_eq!(build.active_skill_set().map(|s| s.title.as_str()), Some("A"));
    build.set_active_skill_set(usize::MAX);
    assert_eq!(build.active_skill_set_index(), 1);

    build.set_active_item_set(3);
    assert_eq!(build.active_item_set_index(), 0);
    assert!(build.active_item_set().is_none());
    assert!(build.active_tree_set().is_none());
}

#[test]
fn metadata_defaults() {
    let build = parse(
        r#"<PathOfBuilding><Build className="Ranger" ascendClassName="None" level="ninety"/></PathOfBuilding>"#,
    );
    assert_eq!(build.class_name, "Ranger");
    assert_eq!(build.level, 1);
    assert_eq!(build.ascendancy_name, None);

    let build = parse(r#"<PathOfBuilding/>"#);
    assert_eq!(build.level, 1);
    assert!(build.skill_sets.is_empty());
    assert!(build.item_sets.is_empty());
    assert!(build.tree_sets.is_empty());
}

const ITEMS: &str = r#"<PathOfBuilding><Items>
    <Item id="1">
        Rarity: UNIQUE
        Kaom's Heart
        Glorious Plate
        Implicits: 0
        Has no Sockets
        +(20-40)% to Fire Resistance
        +500 to maximum Life
    </Item>
    <Item id="2">
        Rarity: RARE
        Storm Knuckle
        Spiked Gloves
    </Item>
    <Item id="3">   </Item>
    <ItemSet id="1" title="Main">
        <Slot name="Body Armour" itemId="1"/>
        <Slot name="Gloves" itemId="2"/>
        <Slot name="Helm" itemId="3"/>
        <Slot name="Weapon 1" itemId="42"/>
        <Slot name="Weapon 2" itemId="0"/>
    </ItemSet>
</Items></PathOfBuilding>"#;

#[test]
fn dangling_item_references_are_dropped() {
    let build = parse(ITEMS);
    let set = build.active_item_set().expect("item set");

    assert_eq!(set.title, "Main");
    assert_eq!(set.len(), 2);
    assert!(set.get("Main Hand").is_none());
    assert!(set.get("Helmet").is_none());

    let kaom = set.get("body armour").expect("body armour");
    assert_eq!(kaom.name, "Kaom's Heart");
    assert_eq!(kaom.slot, "Body Armour");
    assert_eq!(
        kaom.important_mods(),
        vec!["Has no Sockets", "+30% to Fire Resistance", "+500 to maximum Life"]
    );
}

#[test]
fn slots_are_normalized_through_synonyms() {
    let build = parse(
        r#"<PathOfBuilding><Items>
            <Item id="1">Rarity: NORMAL
Iron Ring</Item>
            <Item id="2">Rarity: NORMAL
Royal Burgonet</Item>
            <ItemSet><Slot name="Ring1" itemId="1"/><Slot name="Helm" itemId="2"/></ItemSet>
        </Items></PathOfBuilding>"#,
    );
    let set = &build.item_sets[0];
    let slots: Vec<&str> = set.items.iter().map(|i| i.slot.as_str()).collect();
    assert_eq!(slots, vec!["Ring 1", "Helmet"]);
    assert_eq!(set.title, "Item set 1");
}

#[test]
fn items_without_sets_form_a_default_set() {
    let build = parse(
        r#"<PathOfBuilding><Items>
            <Item id="7">Rarity: NORMAL
Leather Belt</Item>
            <Item id="3">Rarity: MAGIC
Rustic Sash of the Whale</Item>
            <Item>Rarity: NORMAL
No Id</Item>
        </Items></PathOfBuilding>"#,
    );
    assert_eq!(build.item_sets.len(), 1);
    let set = &build.item_sets[0];
    assert_eq!(set.title, "Default");
    let names: Vec<&str> = set.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Leather Belt", "Rustic Sash of the Whale"]);
}

fn v6_url(nodes: &[u16], masteries: &[(u16, u16)]) -> String {
    let mut payload = vec![0, 0, 0, 6, 3, 1, nodes.len() as u8];
    for node in nodes {
        payload.extend_from_slice(&node.to_be_bytes());
    }
    payload.push(0);
    payload.push(masteries.len() as u8);
    for (effect, node) in masteries {
        payload.extend_from_slice(&effect.to_be_bytes());
        payload.extend_from_slice(&node.to_be_bytes());
    }
    format!(
        "https://www.pathofexile.com/passive-skill-tree/{}",
        URL_SAFE_NO_PAD.encode(payload)
    )
}

#[test]
fn tree_specs_decode_their_urls() {
    let xml = format!(
        r#"<PathOfBuilding><Tree activeSpec="2">
            <Spec title="Early" ascendClassId="0"><URL>{}</URL></Spec>
            <Spec title="Late" treeVersion="3_22" classId="3" ascendClassId="2"><URL>
                {}
            </URL></Spec>
        </Tree></PathOfBuilding>"#,
        v6_url(&[5, 6], &[]),
        v6_url(&[10, 20, 30, 20], &[(5, 10)]),
    );
    let build = parse(&xml);
    assert_eq!(build.tree_sets.len(), 2);

    let early = &build.tree_sets[0];
    assert_eq!(early.points_used, 2);
    assert_eq!(early.ascendancy_points_used, 0);

    let late = build.active_tree_set().expect("tree set");
    assert_eq!(late.title, "Late");
    assert_eq!(late.tree_version.as_deref(), Some("3_22"));
    assert_eq!(late.nodes, BTreeSet::from([10, 20, 30]));
    assert_eq!(late.points_used, 3);
    assert_eq!(late.ascendancy_points_used, FULL_ASCENDANCY_POINTS);
    assert_eq!(late.mastery_effects.get(&10), Some(&5));
    assert_eq!(late.class_id, Some(3));
    assert_eq!(late.ascendancy_id, Some(2));
}

#[test]
fn tree_without_specs_is_one_implicit_spec() {
    let xml = format!(
        r#"<PathOfBuilding><Tree><URL>{}</URL></Tree></PathOfBuilding>"#,
        v6_url(&[1, 2, 3, 4], &[])
    );
    let build = parse(&xml);
    assert_eq!(build.tree_sets.len(), 1);
    assert_eq!(build.tree_sets[0].title, "Default");
    assert_eq!(build.tree_sets[0].points_used, 4);
}

#[test]
fn unreadable_tree_urls_fall_back_to_node_attributes() {
    let build = parse(
        r#"<PathOfBuilding><Tree>
            <Spec nodes="7, 8,0,x,9" masteryEffects="{8,100},{9,0}"><URL>https://example.com/tree/AAAABw</URL></Spec>
            <Spec><URL>   </URL></Spec>
        </Tree></PathOfBuilding>"#,
    );
    let first = &build.tree_sets[0];
    assert_eq!(first.nodes, BTreeSet::from([7, 8, 9]));
    assert_eq!(first.points_used, 3);
    assert_eq!(first.mastery_effects.len(), 1);
    assert_eq!(first.mastery_effects.get(&8), Some(&100));

    let second = &build.tree_sets[1];
    assert_eq!(second.title, "Tree 2");
    assert!(second.nodes.is_empty());
    assert_eq!(second.points_used, 0);
}

#[test]
fn tree_sets_enrich_from_passive_reference() {
    let xml = format!(
        r#"<PathOfBuilding><Tree><Spec><URL>{}</URL></Spec></Tree></PathOfBuilding>"#,
        v6_url(&[300, 100, 200, 400], &[])
    );
    let mut build = parse(&xml);
    let reference: HashMap<u16, PassiveNode> = [
        (100, "Elemental Equilibrium", true, false),
        (200, "Heart of Thunder", false, true),
        (300, "Iron Reflexes", true, false),
    ]
    .into_iter()
    .map(|(id, name, is_keystone, is_notable)| {
        (
            id,
            PassiveNode {
                id,
                name: name.into(),
                is_keystone,
                is_notable,
                is_mastery: false,
            },
        )
    })
    .collect();

    let tree = &mut build.tree_sets[0];
    tree.enrich(&reference);
    assert_eq!(tree.keystones, vec!["Elemental Equilibrium", "Iron Reflexes"]);
    assert_eq!(tree.notables, vec!["Heart of Thunder"]);
}

#[test]
fn malformed_xml_is_an_error() {
    for xml in [
        "",
        "   ",
        "not xml at all",
        "<PathOfBuilding><Build></PathOfBuilding>",
        "<PathOfBuilding><Skills>",
        r#"<PathOfBuilding><Build level="1></PathOfBuilding>"#,
    ] {
        let err = parse_build(xml, &GemCatalog::new()).unwrap_err();
        assert!(
            matches!(
                err,
                ParseError::Xml(_) | ParseError::Structure(_) | ParseError::Attr(_)
            ),
            "{xml:?}: {err}"
        );
    }
}

#[test]
fn entities_in_text_are_resolved() {
    let build = parse(
        r#"<PathOfBuilding><Notes>Fire &amp; Ice &#8212; &lt;b&gt;</Notes></PathOfBuilding>"#,
    );
    assert_eq!(build.notes, "Fire & Ice \u{2014} <b>");
}
