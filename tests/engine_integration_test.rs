//! End-to-end scenarios against `engine::analyze`, seeded from the
//! concrete scenarios: fake oracle and chain adapter stand in for `forge`
//! and the JSON-RPC endpoint so the whole pipeline runs in-process.

use async_trait::async_trait;
use std::collections::BTreeMap;
use upgrade_safety_analyzer::chain::ChainAdapter;
use upgrade_safety_analyzer::config::EngineRequest;
use upgrade_safety_analyzer::engine::analyze;
use upgrade_safety_analyzer::engine::proxy::{ADMIN_SLOT, BEACON_SLOT, IMPL_SLOT, PROXIABLE_UUID_SELECTOR};
use upgrade_safety_analyzer::errors::{ChainError, OracleError};
use upgrade_safety_analyzer::oracle::{ArtifactKey, ArtifactOracle};
use upgrade_safety_analyzer::types::{
    Abi, Address, ContractAst, FunctionDecl, FunctionKind, FunctionSig, Mutability, SlotKey, StorageEntry,
    StorageLayout, Verdict, Visibility,
};
use alloy::primitives::Bytes;

struct FakeChain {
    storage: BTreeMap<(Address, SlotKey), SlotKey>,
    code: BTreeMap<Address, Bytes>,
}

#[async_trait]
impl ChainAdapter for FakeChain {
    async fn read_storage_slot(&self, address: Address, slot: SlotKey) -> Result<SlotKey, ChainError> {
        Ok(self.storage.get(&(address, slot)).copied().unwrap_or(SlotKey::ZERO))
    }
    async fn read_code(&self, address: Address) -> Result<Bytes, ChainError> {
        Ok(self.code.get(&address).cloned().unwrap_or_default())
    }
}

fn addr(byte: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = byte;
    Address::from(bytes)
}

fn slot_with_address(a: Address) -> SlotKey {
    let mut bytes = [0u8; 32];
    bytes[12..32].copy_from_slice(a.as_slice());
    SlotKey::from(bytes)
}

struct FakeOracle {
    old_layout: StorageLayout,
    new_layout: StorageLayout,
    old_abi: Abi,
    new_abi: Abi,
    old_ast: ContractAst,
    new_ast: ContractAst,
}

#[async_trait]
impl ArtifactOracle for FakeOracle {
    async fn probe(&self) -> Result<(), OracleError> {
        Ok(())
    }
    async fn build(&self, _project_root: &str) -> Result<(), OracleError> {
        Ok(())
    }
    async fn fetch_storage_layout(&self, key: &ArtifactKey) -> Result<StorageLayout, OracleError> {
        Ok(if key.source_path.contains("Old") { self.old_layout.clone() } else { self.new_layout.clone() })
    }
    async fn fetch_abi(&self, key: &ArtifactKey) -> Result<Abi, OracleError> {
        Ok(if key.source_path.contains("Old") { self.old_abi.clone() } else { self.new_abi.clone() })
    }
    async fn fetch_ast(&self, key: &ArtifactKey) -> Result<ContractAst, OracleError> {
        Ok(if key.source_path.contains("Old") { self.old_ast.clone() } else { self.new_ast.clone() })
    }
}

fn entry(slot: u64, offset: u8, ty: &str, label: &str, index: u32) -> StorageEntry {
    StorageEntry {
        slot,
        offset,
        length_bytes: 32,
        canonical_type: ty.to_string(),
        label: label.to_string(),
        origin: "C".to_string(),
        declaration_index: index,
    }
}

fn func(name: &str, inputs: &[&str]) -> FunctionSig {
    use upgrade_safety_analyzer::types::selector_of;
    let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
    let sig = format!("{}({})", name, inputs.join(","));
    FunctionSig {
        selector: selector_of(&sig),
        name: name.to_string(),
        inputs,
        outputs: vec![],
        mutability: Mutability::View,
    }
}

fn decl(name: &str, kind: FunctionKind, modifiers: Vec<&str>, has_body: bool, references_sender: bool) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        kind,
        visibility: Visibility::Public,
        modifiers: modifiers.into_iter().map(|m| m.to_string()).collect(),
        has_body,
        body_references_sender: references_sender,
        body_has_storage_assignment: false,
        body_calls: Default::default(),
    }
}

fn uups_chain(proxy: Address, implementation: Address) -> FakeChain {
    let mut storage = BTreeMap::new();
    storage.insert((proxy, *IMPL_SLOT), slot_with_address(implementation));
    let mut code = BTreeMap::new();
    let mut impl_code = vec![0x60, 0x01];
    impl_code.extend_from_slice(&PROXIABLE_UUID_SELECTOR);
    code.insert(implementation, Bytes::from(impl_code));
    FakeChain { storage, code }
}

fn request(proxy: Address) -> EngineRequest {
    EngineRequest {
        proxy_address: proxy,
        project_root: ".".to_string(),
        old_implementation_path: "src/Old.sol".to_string(),
        new_implementation_path: "src/New.sol".to_string(),
        rpc_endpoint: "http://localhost:8545".to_string(),
        contract_name: Some("Token".to_string()),
    }
}

#[tokio::test]
async fn safe_append_yields_review_required_from_stor_009_only() {
    let proxy = addr(1);
    let implementation = addr(2);
    let chain = uups_chain(proxy, implementation);

    let oracle = FakeOracle {
        old_layout: StorageLayout { entries: vec![entry(0, 0, "uint256", "value", 0)] },
        new_layout: StorageLayout {
            entries: vec![entry(0, 0, "uint256", "value", 0), entry(1, 0, "address", "owner", 1)],
        },
        old_abi: Abi { functions: vec![func("balanceOf", &["address"])], events: vec![] },
        new_abi: Abi { functions: vec![func("balanceOf", &["address"])], events: vec![] },
        old_ast: ContractAst {
            name: "Token".to_string(),
            functions: vec![decl("_authorizeUpgrade", FunctionKind::Regular, vec!["onlyOwner"], true, false)],
        },
        new_ast: ContractAst {
            name: "Token".to_string(),
            functions: vec![decl("_authorizeUpgrade", FunctionKind::Regular, vec!["onlyOwner"], true, false)],
        },
    };

    let result = analyze(&oracle, &chain, &request(proxy)).await.unwrap();
    assert_eq!(result.verdict, Verdict::ReviewRequired);
    assert_eq!(result.findings.len(), 1);
    assert_eq!(result.findings[0].code, "STOR-009");
}

#[tokio::test]
async fn variable_deleted_yields_unsafe_critical() {
    let proxy = addr(1);
    let implementation = addr(2);
    let chain = uups_chain(proxy, implementation);

    let oracle = FakeOracle {
        old_layout: StorageLayout {
            entries: vec![entry(0, 0, "uint256", "value", 0), entry(1, 0, "address", "owner", 1)],
        },
        new_layout: StorageLayout { entries: vec![entry(0, 0, "uint256", "value", 0)] },
        old_abi: Abi::default(),
        new_abi: Abi::default(),
        old_ast: ContractAst {
            name: "Token".to_string(),
            functions: vec![decl("_authorizeUpgrade", FunctionKind::Regular, vec!["onlyOwner"], true, false)],
        },
        new_ast: ContractAst {
            name: "Token".to_string(),
            functions: vec![decl("_authorizeUpgrade", FunctionKind::Regular, vec!["onlyOwner"], true, false)],
        },
    };

    let result = analyze(&oracle, &chain, &request(proxy)).await.unwrap();
    assert_eq!(result.verdict, Verdict::Unsafe);
    assert!(result.findings.iter().any(|f| f.code == "STOR-001"));
}

#[tokio::test]
async fn uups_unguarded_authorize_upgrade_yields_unsafe() {
    let proxy = addr(1);
    let implementation = addr(2);
    let chain = uups_chain(proxy, implementation);

    let oracle = FakeOracle {
        old_layout: StorageLayout::default(),
        new_layout: StorageLayout::default(),
        old_abi: Abi::default(),
        new_abi: Abi::default(),
        old_ast: ContractAst { name: "Token".to_string(), functions: vec![] },
        new_ast: ContractAst {
            name: "Token".to_string(),
            functions: vec![decl("_authorizeUpgrade", FunctionKind::Regular, vec![], true, false)],
        },
    };

    let result = analyze(&oracle, &chain, &request(proxy)).await.unwrap();
    assert_eq!(result.verdict, Verdict::Unsafe);
    assert!(result.findings.iter().any(|f| f.code == "UUPS-003"));
}

#[tokio::test]
async fn access_control_removed_yields_unsafe() {
    let proxy = addr(1);
    let implementation = addr(2);
    let chain = uups_chain(proxy, implementation);

    let oracle = FakeOracle {
        old_layout: StorageLayout::default(),
        new_layout: StorageLayout::default(),
        old_abi: Abi::default(),
        new_abi: Abi::default(),
        old_ast: ContractAst {
            name: "Token".to_string(),
            functions: vec![
                decl("_authorizeUpgrade", FunctionKind::Regular, vec!["onlyOwner"], true, false),
                decl("adminAction", FunctionKind::Regular, vec!["onlyOwner"], true, false),
            ],
        },
        new_ast: ContractAst {
            name: "Token".to_string(),
            functions: vec![
                decl("_authorizeUpgrade", FunctionKind::Regular, vec!["onlyOwner"], true, false),
                decl("adminAction", FunctionKind::Regular, vec![], true, false),
            ],
        },
    };

    let result = analyze(&oracle, &chain, &request(proxy)).await.unwrap();
    assert_eq!(result.verdict, Verdict::Unsafe);
    assert!(result.findings.iter().any(|f| f.code == "ACL-001"));
}

#[tokio::test]
async fn beacon_proxy_yields_incomplete() {
    let proxy = addr(1);
    let mut storage = BTreeMap::new();
    storage.insert((proxy, *BEACON_SLOT), slot_with_address(addr(9)));
    let chain = FakeChain { storage, code: BTreeMap::new() };

    let oracle = FakeOracle {
        old_layout: StorageLayout::default(),
        new_layout: StorageLayout::default(),
        old_abi: Abi::default(),
        new_abi: Abi::default(),
        old_ast: ContractAst { name: "Token".to_string(), functions: vec![] },
        new_ast: ContractAst { name: "Token".to_string(), functions: vec![] },
    };

    let result = analyze(&oracle, &chain, &request(proxy)).await.unwrap();
    assert_eq!(result.verdict, Verdict::Incomplete);
    for (name, status) in &result.analyzer_status {
        if *name != "proxy-detection" {
            assert_eq!(*status, upgrade_safety_analyzer::types::AnalyzerStatus::Skipped);
        }
    }
}

#[tokio::test]
async fn transparent_zero_admin_yields_unsafe_via_tproxy_001() {
    let proxy = addr(1);
    let implementation = addr(2);
    let mut storage = BTreeMap::new();
    storage.insert((proxy, *IMPL_SLOT), slot_with_address(implementation));
    let mut code = BTreeMap::new();
    code.insert(implementation, Bytes::from_static(&[0xde, 0xad]));
    code.insert(proxy, Bytes::from(ADMIN_SLOT.to_vec()));
    let chain = FakeChain { storage, code };

    let oracle = FakeOracle {
        old_layout: StorageLayout::default(),
        new_layout: StorageLayout::default(),
        old_abi: Abi::default(),
        new_abi: Abi::default(),
        old_ast: ContractAst { name: "Token".to_string(), functions: vec![] },
        new_ast: ContractAst { name: "Token".to_string(), functions: vec![] },
    };

    let result = analyze(&oracle, &chain, &request(proxy)).await.unwrap();
    assert_eq!(result.verdict, Verdict::Unsafe);
    assert!(result.findings.iter().any(|f| f.code == "TPROXY-001"));
}
