//! CSDL documents.

/// CSDL 4.0: `Person` with a to-many `Friends`, a to-one `BestFriend`, a
/// derived `Employee`, a media entity `Photo`, the `Me` singleton and the
/// `GetTopPeople` function import.
pub const PEOPLE_V4_METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="Demo" Alias="D" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <EntityType Name="Person">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
        <Property Name="Name" Type="Edm.String" Nullable="false"/>
        <NavigationProperty Name="Friends" Type="Collection(Demo.Person)"/>
        <NavigationProperty Name="BestFriend" Type="Demo.Person"/>
        <NavigationProperty Name="Photo" Type="Demo.Photo" Nullable="false"/>
      </EntityType>
      <EntityType Name="Employee" BaseType="Demo.Person">
        <Property Name="Salary" Type="Edm.Decimal"/>
      </EntityType>
      <EntityType Name="Photo" HasStream="true">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
        <Property Name="Caption" Type="Edm.String"/>
      </EntityType>
      <Function Name="GetTopPeople">
        <Parameter Name="n" Type="Edm.Int32"/>
        <ReturnType Type="Collection(Demo.Person)"/>
      </Function>
      <EntityContainer Name="Container">
        <EntitySet Name="People" EntityType="Demo.Person">
          <NavigationPropertyBinding Path="Friends" Target="People"/>
          <NavigationPropertyBinding Path="BestFriend" Target="People"/>
          <NavigationPropertyBinding Path="Photo" Target="Photos"/>
        </EntitySet>
        <EntitySet Name="Photos" EntityType="Demo.Photo"/>
        <Singleton Name="Me" Type="Demo.Person"/>
        <FunctionImport Name="GetTopPeople" Function="Demo.GetTopPeople" EntitySet="People"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#;

/// CSDL 3.0 with associations: the same `Person` shape plus a nullable
/// `Age`.
pub const PEOPLE_V3_METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="1.0" xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">
  <edmx:DataServices m:DataServiceVersion="3.0" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
    <Schema Namespace="Demo" xmlns="http://schemas.microsoft.com/ado/2009/11/edm">
      <EntityType Name="Person">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
        <Property Name="Name" Type="Edm.String" Nullable="false" ConcurrencyMode="Fixed"/>
        <Property Name="Age" Type="Edm.Int32" Nullable="true"/>
        <NavigationProperty Name="Friends" Relationship="Demo.Person_Friends" FromRole="Person" ToRole="Friend"/>
        <NavigationProperty Name="BestFriend" Relationship="Demo.Person_BestFriend" FromRole="Person" ToRole="BestFriend"/>
      </EntityType>
      <EntityType Name="Employee" BaseType="Demo.Person">
        <Property Name="Salary" Type="Edm.Decimal"/>
      </EntityType>
      <EntityType Name="Photo" m:HasStream="true">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
      </EntityType>
      <Association Name="Person_Friends">
        <End Role="Person" Type="Demo.Person" Multiplicity="*"/>
        <End Role="Friend" Type="Demo.Person" Multiplicity="*"/>
      </Association>
      <Association Name="Person_BestFriend">
        <End Role="Person" Type="Demo.Person" Multiplicity="*"/>
        <End Role="BestFriend" Type="Demo.Person" Multiplicity="0..1"/>
      </Association>
      <EntityContainer Name="Container" m:IsDefaultEntityContainer="true">
        <EntitySet Name="People" EntityType="Demo.Person"/>
        <EntitySet Name="Photos" EntityType="Demo.Photo"/>
        <AssociationSet Name="People_Friends" Association="Demo.Person_Friends">
          <End Role="Person" EntitySet="People"/>
          <End Role="Friend" EntitySet="People"/>
        </AssociationSet>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#;

/// CSDL 3.0 whose `Person.Broken` names an association that is not declared.
pub const UNRESOLVED_NAVIGATION_METADATA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="1.0" xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">
  <edmx:DataServices m:DataServiceVersion="3.0" xmlns:m="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata">
    <Schema Namespace="Demo" xmlns="http://schemas.microsoft.com/ado/2009/11/edm">
      <EntityType Name="Person">
        <Key><PropertyRef Name="Id"/></Key>
        <Property Name="Id" Type="Edm.Int32" Nullable="false"/>
        <NavigationProperty Name="Broken" Relationship="Demo.Missing" FromRole="A" ToRole="B"/>
      </EntityType>
      <EntityContainer Name="Container" m:IsDefaultEntityContainer="true">
        <EntitySet Name="People" EntityType="Demo.Person"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>
"#;
